//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::Json;
use axum::http::StatusCode;
use labcap_core::{
    AttributedValidation, CaptureError, CaptureOutcome, ConversationTurn, Record,
    RegistryLookupResult, SessionSummary, TurnRole, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// CAPTURE
// =============================================================================

/// One capture call from the conversational layer.
///
/// `record_type` arrives as a string and is parsed at the boundary so an
/// unrecognized type is rejected before any write. `tool_use_id` is the
/// invocation id the stream consumer observed; when present the response
/// carries the attributed validation back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureApiRequest {
    pub session_id: String,
    pub record_type: String,
    pub data: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub link_to: Option<String>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

/// Capture response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub action: String,
    pub record_id: String,
    pub record_type: String,
    pub category: String,
    pub name: Option<String>,
    pub message: String,
    pub validation: ValidationResult,
    pub validation_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry_lookups: Vec<RegistryLookupResult>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<AttributedValidation>,
}

impl CaptureResponse {
    /// Build the response from a capture outcome.
    #[must_use]
    pub fn from_outcome(outcome: CaptureOutcome, tool_result: Option<AttributedValidation>) -> Self {
        let record = &outcome.record;
        Self {
            action: outcome.action.as_str().to_string(),
            record_id: record.id.to_string(),
            record_type: record.record_type.to_string(),
            category: record.category.to_string(),
            name: record.name.clone(),
            message: format!(
                "Successfully {} {} record",
                outcome.action.as_str(),
                record.record_type
            ),
            validation: outcome.validation,
            validation_summary: outcome.validation_summary,
            registry_lookups: outcome.registry_lookups,
            registry_summary: outcome.registry_summary,
            tool_result,
        }
    }
}

// =============================================================================
// RECORD CRUD
// =============================================================================

/// Create-record request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub session_id: String,
    pub record_type: String,
    pub data: Value,
    #[serde(default)]
    pub name: Option<String>,
}

/// Update-record request; data shallow-merges onto the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Compact record view returned by searches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: String,
    pub record_type: String,
    pub category: String,
    pub name: Option<String>,
    pub status: String,
    pub data: Value,
    pub session_id: String,
}

impl From<&Record> for RecordSummary {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.to_string(),
            record_type: record.record_type.to_string(),
            category: record.category.to_string(),
            name: record.name.clone(),
            status: record.status.as_str().to_string(),
            data: record.data.clone(),
            session_id: record.session_id.clone(),
        }
    }
}

/// Query parameters accepted by `GET /records`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindParams {
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

/// Search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResponse {
    pub count: usize,
    pub records: Vec<RecordSummary>,
}

/// Deletion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

// =============================================================================
// LINKS
// =============================================================================

/// Link / unlink request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub source_id: String,
    pub target_id: String,
}

/// Link response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub message: String,
    pub source_id: String,
    pub target_id: String,
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Session listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// One conversation turn to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Speaker role: "user" or "assistant".
    pub role: TurnRole,
    pub content: String,
}

/// Conversation history response, oldest turn first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub turns: Vec<ConversationTurn>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error payload for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a capture error onto its HTTP status and payload.
#[must_use]
pub fn error_response(error: &CaptureError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match error {
        CaptureError::NotFound(_) => StatusCode::NOT_FOUND,
        CaptureError::InvalidType(_) | CaptureError::Serialization(_) => StatusCode::BAD_REQUEST,
        CaptureError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}
