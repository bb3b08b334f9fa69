//! # Capture Operation
//!
//! The one orchestration entry point for a conversational capture:
//! store write -> validate -> persist validation -> publish turn event ->
//! registry lookups -> summaries.
//!
//! A capture always completes with a definite created/updated outcome
//! plus a validation result, regardless of whether registry lookups
//! succeeded, partially succeeded, or never triggered. The store write
//! happens under the catalog's write guard; the registry fan-out runs
//! after the guard is released so network latency never serializes
//! unrelated sessions.

use crate::catalog::SharedCatalog;
use crate::events::{TurnSender, ValidationEvent};
use crate::registry::{LookupOptions, RegistryProvider, extract_queries, format_summary, run_lookups};
use crate::schema::SchemaConfig;
use crate::types::{
    CaptureError, Record, RecordId, RecordType, RegistryLookupResult, ValidationResult,
    ValidationStatus,
};
use crate::validation::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// REQUEST / OUTCOME
// =============================================================================

/// One capture request from the conversational layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub session_id: String,
    pub record_type: RecordType,
    pub data: Value,
    #[serde(default)]
    pub name: Option<String>,
    /// Address an existing record to merge into instead of creating.
    #[serde(default)]
    pub record_id: Option<RecordId>,
    /// Link the captured record to an existing one.
    #[serde(default)]
    pub link_to: Option<RecordId>,
}

/// What the store write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureAction {
    Created,
    Updated,
}

impl CaptureAction {
    /// Past-tense verb for messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CaptureAction::Created => "created",
            CaptureAction::Updated => "updated",
        }
    }
}

/// The definite result of one capture operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub action: CaptureAction,
    pub record: Record,
    pub validation: ValidationResult,
    pub validation_summary: String,
    pub registry_lookups: Vec<RegistryLookupResult>,
    pub registry_summary: String,
}

// =============================================================================
// CAPTURE
// =============================================================================

/// Execute one capture operation.
///
/// The turn sender is optional: a caller with no stream consumer passes
/// `None` and the validation result is still returned directly. Registry
/// lookup failures never surface here; the lookup list is simply shorter.
pub async fn capture(
    catalog: &SharedCatalog,
    schema: &SchemaConfig,
    registries: &RegistryProvider,
    events: Option<&TurnSender>,
    request: CaptureRequest,
) -> Result<CaptureOutcome, CaptureError> {
    if !request.data.is_object() {
        return Err(CaptureError::Serialization(
            "capture data must be a JSON object".to_string(),
        ));
    }

    // Store write, validation, and validation persistence happen under
    // one write guard; the registry fan-out below runs without it.
    let (record, action, validation) = {
        let mut catalog = catalog.write().await;

        let (record, action) = match &request.record_id {
            Some(id) => {
                let record =
                    catalog.update(id, Some(request.data.clone()), request.name.clone())?;
                (record, CaptureAction::Updated)
            }
            None => {
                let record = catalog.create(
                    &request.session_id,
                    request.record_type,
                    request.data.clone(),
                    request.name.clone(),
                )?;
                (record, CaptureAction::Created)
            }
        };

        if let Some(target) = &request.link_to {
            match catalog.link(&record.id, target) {
                Ok(()) => {
                    tracing::info!(source = %record.id, target = %target, "linked records");
                }
                Err(CaptureError::NotFound(_)) => {
                    tracing::warn!(target = %target, "link target not found; skipping link");
                }
                Err(other) => return Err(other),
            }
        }

        let validation = validate(record.record_type, &record.data, schema);
        catalog.set_validation(&record.id, validation.clone())?;
        let record = catalog.get(&record.id)?;
        (record, action, validation)
    };

    // Push the validation into the turn channel so the stream consumer
    // can attach it to the tool invocation it observed.
    if let Some(sender) = events {
        sender.publish(ValidationEvent {
            record_id: record.id.clone(),
            record_type: record.record_type,
            validation: validation.clone(),
        });
    }

    let queries = extract_queries(record.record_type, &record.data);
    let registry_lookups = if queries.is_empty() {
        Vec::new()
    } else {
        run_lookups(registries, queries, &LookupOptions::default()).await
    };
    let registry_summary = format_summary(&registry_lookups);
    let validation_summary = format_validation_summary(&validation);

    Ok(CaptureOutcome {
        action,
        record,
        validation,
        validation_summary,
        registry_lookups,
        registry_summary,
    })
}

// =============================================================================
// VALIDATION SUMMARY
// =============================================================================

/// Render a validation result as clear text for the conversational layer
/// to relay to the user.
#[must_use]
pub fn format_validation_summary(validation: &ValidationResult) -> String {
    if validation.status == ValidationStatus::Valid && validation.missing_required.is_empty() {
        return "VALIDATION PASSED: All fields are valid.".to_string();
    }

    let mut lines: Vec<String> = Vec::new();

    if !validation.errors.is_empty() {
        lines.push("VALIDATION ERRORS (must be fixed):".to_string());
        for issue in &validation.errors {
            lines.push(format!("  - {}: {}", issue.field, issue.message));
        }
    }

    if !validation.missing_required.is_empty() {
        lines.push(format!(
            "MISSING REQUIRED FIELDS: {}",
            validation.missing_required.join(", ")
        ));
    }

    if !validation.warnings.is_empty() {
        lines.push("WARNINGS:".to_string());
        for issue in &validation.warnings {
            lines.push(format!("  - {}: {}", issue.field, issue.message));
        }
    }

    lines.push(String::new());
    lines.push("You MUST report these issues to the user and suggest how to fix them.".to_string());

    lines.join("\n")
}

// =============================================================================
// TESTS
// =============================================================================
