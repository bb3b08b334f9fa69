//! # Core Type Definitions
//!
//! This module contains all core types for the Labcap metadata capture engine:
//! - Record identity and classification (`RecordId`, `RecordType`, `Category`)
//! - The persisted record and its lifecycle (`Record`, `RecordStatus`)
//! - Conversation history (`ConversationTurn`, `TurnRole`, `SessionSummary`)
//! - Validation output (`ValidationResult`, `ValidationIssue`, `Severity`)
//! - Registry lookup output (`Registry`, `RegistryEntry`, `RegistryLookupResult`)
//! - Error types (`CaptureError`)
//!
//! ## Classification Invariant
//!
//! `Category` is always derived from `RecordType` through a fixed static
//! mapping. It is never settable independently, and `record_type` never
//! changes after a record is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// RECORD IDENTITY
// =============================================================================

/// Opaque identifier of a metadata record.
///
/// Generated as a UUIDv4 string at creation time; treated as an opaque
/// token everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh record id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RECORD TYPE & CATEGORY
// =============================================================================

/// The nine recognized metadata record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Subject,
    Procedures,
    Instrument,
    Rig,
    DataDescription,
    Acquisition,
    Session,
    Processing,
    QualityControl,
}

/// Derived classification of a record type.
///
/// Shared records (subject, procedures, instrument, rig) are designed to
/// be reused across capture sessions; asset records belong to a single
/// data asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Shared,
    Asset,
}

impl RecordType {
    /// All recognized record types, in canonical order.
    pub const ALL: [RecordType; 9] = [
        RecordType::Subject,
        RecordType::Procedures,
        RecordType::Instrument,
        RecordType::Rig,
        RecordType::DataDescription,
        RecordType::Acquisition,
        RecordType::Session,
        RecordType::Processing,
        RecordType::QualityControl,
    ];

    /// The static record-type to category mapping.
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            RecordType::Subject
            | RecordType::Procedures
            | RecordType::Instrument
            | RecordType::Rig => Category::Shared,
            RecordType::DataDescription
            | RecordType::Acquisition
            | RecordType::Session
            | RecordType::Processing
            | RecordType::QualityControl => Category::Asset,
        }
    }

    /// Canonical snake_case name of this record type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordType::Subject => "subject",
            RecordType::Procedures => "procedures",
            RecordType::Instrument => "instrument",
            RecordType::Rig => "rig",
            RecordType::DataDescription => "data_description",
            RecordType::Acquisition => "acquisition",
            RecordType::Session => "session",
            RecordType::Processing => "processing",
            RecordType::QualityControl => "quality_control",
        }
    }

    /// Parse a record type from its canonical name.
    ///
    /// This is the single gate through which external input becomes a
    /// typed record type; anything unrecognized is rejected here, before
    /// any write happens.
    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CaptureError::InvalidType(s.to_string()))
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Category {
    /// Canonical lowercase name of this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Shared => "shared",
            Category::Asset => "asset",
        }
    }

    /// Parse a category from its canonical name.
    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        match s {
            "shared" => Ok(Category::Shared),
            "asset" => Ok(Category::Asset),
            other => Err(CaptureError::InvalidType(other.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RECORD STATUS
// =============================================================================

/// Lifecycle status of a record.
///
/// `Draft -> Confirmed` is the only transition performed by the store,
/// and it is terminal. Confirmation is a user action, not a correctness
/// gate: a record with active validation errors can still be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Draft,
    Validated,
    Confirmed,
    Error,
}

impl RecordStatus {
    /// Canonical lowercase name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Validated => "validated",
            RecordStatus::Confirmed => "confirmed",
            RecordStatus::Error => "error",
        }
    }

    /// Parse a status from its canonical name.
    pub fn parse(s: &str) -> Result<Self, CaptureError> {
        match s {
            "draft" => Ok(RecordStatus::Draft),
            "validated" => Ok(RecordStatus::Validated),
            "confirmed" => Ok(RecordStatus::Confirmed),
            "error" => Ok(RecordStatus::Error),
            other => Err(CaptureError::InvalidType(other.to_string())),
        }
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// One typed, persisted unit of captured metadata.
///
/// `data` is a schemaless nested document; the validation engine, not the
/// store, enforces per-type shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub session_id: String,
    pub record_type: RecordType,
    pub category: Category,
    pub name: Option<String>,
    pub data: Value,
    pub status: RecordStatus,
    pub validation: Option<ValidationResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// CONVERSATION HISTORY
// =============================================================================

/// Speaker role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One persisted turn of a capture conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view of one capture session's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: usize,
    pub first_message: Option<String>,
}

// =============================================================================
// VALIDATION OUTPUT
// =============================================================================

/// Severity of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation error or warning on one field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

/// Overall validation status, derived from issue severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Warnings,
    Errors,
}

/// Aggregated validation result for one record.
///
/// `completeness_score` is the fraction of the type's required fields
/// that are present, in `[0, 1]` rounded to two decimals. It considers
/// presence only: a record can score 1.0 and still carry enum errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub record_type: RecordType,
    pub status: ValidationStatus,
    pub completeness_score: f64,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub missing_required: Vec<String>,
    pub valid_fields: Vec<String>,
}

// =============================================================================
// REGISTRY LOOKUP OUTPUT
// =============================================================================

/// External biological registries consulted during capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registry {
    /// Plasmid/vector catalog.
    Addgene,
    /// Gene database (E-utilities).
    NcbiGene,
    /// Mouse gene/allele informatics database.
    Mgi,
}

impl Registry {
    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Registry::Addgene => "addgene",
            Registry::NcbiGene => "ncbi_gene",
            Registry::Mgi => "mgi",
        }
    }

    /// Human-facing display name used in summaries.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Registry::Addgene => "ADDGENE",
            Registry::NcbiGene => "NCBI GENE",
            Registry::Mgi => "MGI",
        }
    }
}

impl std::fmt::Display for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry returned by a registry backend.
///
/// The three registries return different shapes; the variants mirror
/// them rather than forcing a common denominator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryEntry {
    /// A gene database hit.
    Gene {
        gene_id: String,
        symbol: String,
        description: String,
        organism: String,
        url: String,
    },
    /// A plasmid catalog hit.
    Plasmid {
        catalog_number: String,
        name: String,
        description: String,
        url: String,
    },
    /// A bare confirmed reference page.
    Reference { url: String },
}

/// What a single registry backend call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LookupOutcome {
    pub found: bool,
    #[serde(default)]
    pub results: Vec<RegistryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupOutcome {
    /// A successful lookup with matching entries.
    #[must_use]
    pub fn found(results: Vec<RegistryEntry>) -> Self {
        Self {
            found: true,
            results,
            error: None,
        }
    }

    /// A successful lookup that matched nothing.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// A lookup that reached the registry but came back unusable.
    ///
    /// Soft failures are carried through to the summary; hard transport
    /// failures are raised by the backend instead and omitted upstream.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            found: false,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// A lookup outcome attributed to the registry and query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLookupResult {
    pub registry: Registry,
    pub query: String,
    pub found: bool,
    #[serde(default)]
    pub results: Vec<RegistryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegistryLookupResult {
    /// Attribute a backend outcome to its registry and query.
    #[must_use]
    pub fn from_outcome(registry: Registry, query: impl Into<String>, outcome: LookupOutcome) -> Self {
        Self {
            registry,
            query: query.into(),
            found: outcome.found,
            results: outcome.results,
            error: outcome.error,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Labcap capture engine.
///
/// Validation issues are deliberately NOT represented here: a record
/// failing validation is a normal, structured result, never an error.
/// Registry lookup failures are swallowed at the registry subsystem
/// boundary and never reach this taxonomy either.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The record type is not one of the nine recognized values.
    /// Rejected before any write happens.
    #[error("invalid record type '{0}'")]
    InvalidType(String),

    /// The requested record does not exist. Always recoverable.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record or configuration document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================
