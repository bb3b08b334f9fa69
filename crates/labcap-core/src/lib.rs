//! # labcap-core
//!
//! The metadata capture engine for Labcap - THE LOGIC.
//!
//! This crate implements the four-part capture pipeline behind the
//! conversational interface:
//!
//! - **Record graph store**: typed records, shallow-merge updates, an
//!   undirected link graph, and per-session conversation history, over
//!   in-memory or redb-backed storage.
//! - **Validation engine**: a pure function of (record type, data,
//!   schema config) producing structured results with a completeness
//!   score. Issues are values, never errors.
//! - **Registry correlation**: extraction of lookup-worthy substrings
//!   and bounded-deadline concurrent lookups against pluggable external
//!   registry backends. Best-effort by design.
//! - **Streaming result correlator**: a per-conversation-turn event
//!   channel attaching validation results to the tool invocation that
//!   produced them, exactly once.
//!
//! ## Architectural Constraints
//!
//! - Transport lives in the apps; this crate never opens a socket
//! - Registry backends and vocabularies are injected, not hardcoded
//! - Store mutations are atomic per call; no cross-record transactions

// =============================================================================
// MODULES
// =============================================================================

pub mod capture;
pub mod catalog;
pub mod events;
pub mod primitives;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CaptureError, Category, ConversationTurn, LookupOutcome, Record, RecordId, RecordStatus,
    RecordType, Registry, RegistryEntry, RegistryLookupResult, SessionSummary, Severity, TurnRole,
    ValidationIssue, ValidationResult, ValidationStatus,
};

// =============================================================================
// RE-EXPORTS: Record Graph Store
// =============================================================================

pub use catalog::{Catalog, CatalogStats, RecordFilter, SharedCatalog, StorageBackend};
pub use storage::RedbStore;
pub use store::{MemoryStore, RecordStore, derive_name, shallow_merge};

// =============================================================================
// RE-EXPORTS: Validation Engine
// =============================================================================

pub use schema::SchemaConfig;
pub use validation::validate;

// =============================================================================
// RE-EXPORTS: Registry Correlation
// =============================================================================

pub use registry::{
    LookupError, LookupOptions, RegistryBackend, RegistryProvider, extract_queries,
    format_summary, run_lookups,
};

// =============================================================================
// RE-EXPORTS: Streaming Result Correlator
// =============================================================================

pub use capture::{
    CaptureAction, CaptureOutcome, CaptureRequest, capture, format_validation_summary,
};
pub use events::{
    AttributedValidation, ToolUseCorrelator, TurnReceiver, TurnSender, ValidationEvent,
    turn_channel,
};
