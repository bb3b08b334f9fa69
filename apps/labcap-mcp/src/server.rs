//! # Labcap MCP Server
//!
//! Implements `ServerHandler` with the three capture tools the
//! conversational model calls during a session: `capture_metadata`,
//! `find_records`, and `link_records`. All three proxy to the Labcap
//! HTTP API.

use crate::client::LabcapClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::Value;

// =============================================================================
// MCP SERVER
// =============================================================================

/// MCP server that bridges to a Labcap HTTP API.
#[derive(Clone)]
pub struct LabcapMcp {
    client: LabcapClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETER STRUCTS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CaptureParams {
    /// The capture session this record belongs to.
    #[schemars(description = "The capture session this record belongs to")]
    pub session_id: String,
    /// Record type: subject, procedures, instrument, rig, data_description,
    /// acquisition, session, processing, or quality_control.
    #[schemars(
        description = "Record type: subject, procedures, instrument, rig, data_description, acquisition, session, processing, or quality_control"
    )]
    pub record_type: String,
    /// The metadata fields for this record, as a JSON object.
    #[schemars(description = "The metadata fields for this record, as a JSON object")]
    pub data: Value,
    /// Optional display name for the record.
    #[schemars(description = "Optional display name for the record")]
    pub name: Option<String>,
    /// Pass an existing record's id to update it instead of creating.
    #[schemars(description = "Pass an existing record's id to update it instead of creating")]
    pub record_id: Option<String>,
    /// Optional id of an existing record to link the captured one to.
    #[schemars(description = "Optional id of an existing record to link the captured one to")]
    pub link_to: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindParams {
    /// Record type filter.
    #[schemars(description = "Record type filter (e.g. 'subject', 'instrument')")]
    pub record_type: Option<String>,
    /// Text query matched against record names and data.
    #[schemars(description = "Text query matched against record names and data")]
    pub query: Option<String>,
    /// Category filter: 'shared' or 'asset'.
    #[schemars(description = "Category filter: 'shared' or 'asset'")]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LinkParams {
    /// The source record id.
    #[schemars(description = "The source record id")]
    pub source_id: String,
    /// The target record id.
    #[schemars(description = "The target record id")]
    pub target_id: String,
}

// =============================================================================
// TOOL IMPLEMENTATIONS
// =============================================================================

#[tool_router]
impl LabcapMcp {
    pub fn new(client: LabcapClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Save or update a single metadata record from the scientist's input. \
        Call this whenever you identify metadata in the conversation; each call captures one \
        record type (e.g. just the subject, or just a procedure). Shared types (subject, \
        procedures, instrument, rig) are reusable across experiments; the rest are tied to a \
        data asset. Pass record_id to update an existing record, or link_to to link the \
        captured record to another one. The response includes validation results and external \
        registry lookups that you MUST relay to the user."
    )]
    async fn capture_metadata(
        &self,
        params: Parameters<CaptureParams>,
    ) -> Result<CallToolResult, McpError> {
        let CaptureParams {
            session_id,
            record_type,
            data,
            name,
            record_id,
            link_to,
        } = params.0;

        if !data.is_object() {
            return Err(McpError::invalid_params(
                "data must be a JSON object".to_string(),
                None,
            ));
        }

        let body = serde_json::json!({
            "session_id": session_id,
            "record_type": record_type,
            "data": data,
            "name": name,
            "record_id": record_id,
            "link_to": link_to,
        });

        match self.client.capture(body).await {
            Ok(resp) => {
                let mut sections = Vec::new();
                if let Some(message) = resp.get("message").and_then(|v| v.as_str()) {
                    let record_id = resp.get("record_id").and_then(|v| v.as_str()).unwrap_or("?");
                    sections.push(format!("{message} (record_id: {record_id})"));
                }
                if let Some(summary) = resp.get("validation_summary").and_then(|v| v.as_str()) {
                    sections.push(summary.to_string());
                }
                if let Some(summary) = resp.get("registry_summary").and_then(|v| v.as_str())
                    && !summary.is_empty()
                {
                    sections.push(summary.to_string());
                }
                if sections.is_empty() {
                    sections.push(resp.to_string());
                }
                Ok(CallToolResult::success(vec![Content::text(
                    sections.join("\n\n"),
                )]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(
        description = "Search for existing metadata records. Use this to find shared records \
        (subjects, instruments, rigs, procedures) that can be linked to new data assets \
        instead of creating duplicates."
    )]
    async fn find_records(
        &self,
        params: Parameters<FindParams>,
    ) -> Result<CallToolResult, McpError> {
        let FindParams {
            record_type,
            query,
            category,
        } = params.0;

        if record_type.is_none() && query.is_none() && category.is_none() {
            return Err(McpError::invalid_params(
                "At least one of record_type, query, or category is required".to_string(),
                None,
            ));
        }

        match self
            .client
            .find(record_type.as_deref(), query.as_deref(), category.as_deref())
            .await
        {
            Ok(resp) => Ok(CallToolResult::success(vec![Content::text(
                format_find_response(&resp),
            )])),
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }

    #[tool(
        description = "Create a link between two metadata records, e.g. a session to its \
        subject, or an acquisition to its instrument. Links are bidirectional."
    )]
    async fn link_records(
        &self,
        params: Parameters<LinkParams>,
    ) -> Result<CallToolResult, McpError> {
        let LinkParams {
            source_id,
            target_id,
        } = params.0;

        // Surface missing endpoints as parameter errors rather than opaque 404s.
        if let Err(e) = self.client.get_record(&source_id).await {
            return Err(McpError::invalid_params(
                format!("Source record {source_id}: {e}"),
                None,
            ));
        }
        if let Err(e) = self.client.get_record(&target_id).await {
            return Err(McpError::invalid_params(
                format!("Target record {target_id}: {e}"),
                None,
            ));
        }

        match self.client.link(&source_id, &target_id).await {
            Ok(resp) => {
                let text = resp
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map_or_else(|| resp.to_string(), str::to_string);
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Err(McpError::internal_error(format!("{e}"), None)),
        }
    }
}

// =============================================================================
// SERVER HANDLER
// =============================================================================

#[tool_handler]
impl ServerHandler for LabcapMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Labcap experiment-metadata capture server. Use capture_metadata to save \
                 typed records as the scientist describes their experiment, find_records to \
                 reuse existing shared records, and link_records to associate related \
                 records. Always relay validation and registry results back to the user."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// RESPONSE FORMATTING
// =============================================================================

/// Format a find response JSON into human-readable text.
fn format_find_response(resp: &Value) -> String {
    let count = resp.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
    if count == 0 {
        return "No matching records.".to_string();
    }

    let mut parts = vec![format!("{count} matching record(s):")];
    if let Some(records) = resp.get("records").and_then(|v| v.as_array()) {
        for record in records {
            let id = record.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            let record_type = record
                .get("record_type")
                .and_then(|v| v.as_str())
                .unwrap_or("?");
            let name = record
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("(unnamed)");
            let status = record.get("status").and_then(|v| v.as_str()).unwrap_or("?");
            let data = record
                .get("data")
                .map(|v| v.to_string())
                .unwrap_or_default();
            parts.push(format!(
                "  [{record_type}] id={id} name=\"{name}\" status={status} data={data}"
            ));
        }
    }
    parts.join("\n")
}
