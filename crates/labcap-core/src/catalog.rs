//! # Catalog Module
//!
//! The public face of the record graph store: a backend-dispatching
//! wrapper that owns the domain logic (id assignment, shallow merging,
//! name derivation, ordering, paging) while the `RecordStore` trait
//! implementations stay plain CRUD.
//!
//! ## Storage Backends
//!
//! Catalog supports two storage backends:
//! - `InMemory`: volatile `MemoryStore` (fast, nothing survives exit)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use crate::primitives::FIND_PAGE_LIMIT;
use crate::storage::RedbStore;
use crate::store::{MemoryStore, RecordStore, derive_name, shallow_merge};
use crate::types::{
    CaptureError, Category, ConversationTurn, Record, RecordId, RecordStatus, RecordType,
    SessionSummary, TurnRole, ValidationResult,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle used by request-handling layers: one writer at a time,
/// concurrent readers across independent sessions.
pub type SharedCatalog = Arc<RwLock<Catalog>>;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Catalog.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbStore (database handle) cannot be safely cloned; share a Catalog
// through `SharedCatalog` instead.

// =============================================================================
// FIND FILTER
// =============================================================================

/// Filter for `Catalog::find`. All fields are optional and combined
/// with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub record_type: Option<RecordType>,
    pub category: Option<Category>,
    pub status: Option<RecordStatus>,
    /// Case-insensitive substring match against name or serialized data.
    pub query: Option<String>,
}

impl RecordFilter {
    fn matches(&self, record: &Record) -> bool {
        if let Some(t) = self.record_type
            && record.record_type != t
        {
            return false;
        }
        if let Some(c) = self.category
            && record.category != c
        {
            return false;
        }
        if let Some(s) = self.status
            && record.status != s
        {
            return false;
        }
        if let Some(ref query) = self.query {
            let needle = query.to_lowercase();
            let name_hit = record
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle));
            let data_hit = serde_json::to_string(&record.data)
                .map(|s| s.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !name_hit && !data_hit {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// The record graph store.
///
/// Owns record lifecycle, field merging, and the undirected link graph.
/// Updates are destructive (records are never versioned); concurrent
/// edits to the same record resolve last-write-wins.
#[derive(Debug, Default)]
pub struct Catalog {
    backend: StorageBackend,
}

impl Catalog {
    /// Create a new catalog with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog over an existing in-memory store.
    #[must_use]
    pub fn with_memory(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
        }
    }

    /// Create a catalog with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path. All changes
    /// are persisted to disk as they happen.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let store = RedbStore::open(path)?;
        Ok(Self {
            backend: StorageBackend::Persistent(store),
        })
    }

    /// Wrap this catalog in the shared handle used by app layers.
    #[must_use]
    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    fn store(&self) -> &dyn RecordStore {
        match &self.backend {
            StorageBackend::InMemory(s) => s,
            StorageBackend::Persistent(s) => s,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RecordStore {
        match &mut self.backend {
            StorageBackend::InMemory(s) => s,
            StorageBackend::Persistent(s) => s,
        }
    }

    fn require(&self, id: &RecordId) -> Result<Record, CaptureError> {
        self.store()
            .fetch(id)?
            .ok_or_else(|| CaptureError::NotFound(id.clone()))
    }

    // =========================================================================
    // RECORD LIFECYCLE
    // =========================================================================

    /// Create a new record.
    ///
    /// Assigns the id, derives the category from the static type mapping,
    /// and sets status to draft. The display name is the explicit one if
    /// supplied, otherwise derived from the data.
    pub fn create(
        &mut self,
        session_id: &str,
        record_type: RecordType,
        data: Value,
        name: Option<String>,
    ) -> Result<Record, CaptureError> {
        let now = Utc::now();
        let record = Record {
            id: RecordId::generate(),
            session_id: session_id.to_string(),
            record_type,
            category: record_type.category(),
            name: name.or_else(|| derive_name(record_type, &data)),
            data,
            status: RecordStatus::Draft,
            validation: None,
            created_at: now,
            updated_at: now,
        };
        self.store_mut().put(record.clone())?;
        Ok(record)
    }

    /// Get a record by id.
    pub fn get(&self, id: &RecordId) -> Result<Record, CaptureError> {
        self.require(id)
    }

    /// Update a record's data and/or name.
    ///
    /// New data shallow-merges onto existing data. When the name is not
    /// explicitly supplied but the data changed, the name is re-derived
    /// (idempotent for unchanged data); a type with no heuristic keeps
    /// its current name. Status is left untouched, confirmed included.
    pub fn update(
        &mut self,
        id: &RecordId,
        data: Option<Value>,
        name: Option<String>,
    ) -> Result<Record, CaptureError> {
        let mut record = self.require(id)?;
        let mut changed = false;

        if let Some(incoming) = data {
            record.data = shallow_merge(&record.data, &incoming);
            changed = true;
            if name.is_none()
                && let Some(auto) = derive_name(record.record_type, &record.data)
            {
                record.name = Some(auto);
            }
        }
        if let Some(explicit) = name {
            record.name = Some(explicit);
            changed = true;
        }

        if changed {
            record.updated_at = Utc::now();
            self.store_mut().put(record.clone())?;
        }
        Ok(record)
    }

    /// Update a single top-level key within a record's data.
    pub fn update_field(
        &mut self,
        id: &RecordId,
        key: &str,
        value: Value,
    ) -> Result<Record, CaptureError> {
        let mut patch = serde_json::Map::new();
        patch.insert(key.to_string(), value);
        self.update(id, Some(Value::Object(patch)), None)
    }

    /// Attach the latest validation result. Does not change status.
    pub fn set_validation(
        &mut self,
        id: &RecordId,
        validation: ValidationResult,
    ) -> Result<(), CaptureError> {
        let mut record = self.require(id)?;
        record.validation = Some(validation);
        record.updated_at = Utc::now();
        self.store_mut().put(record)
    }

    /// Transition a record to confirmed.
    ///
    /// Unconditional and terminal: confirmation is a user action, not a
    /// correctness gate, and there is no un-confirm.
    pub fn confirm(&mut self, id: &RecordId) -> Result<Record, CaptureError> {
        let mut record = self.require(id)?;
        record.status = RecordStatus::Confirmed;
        record.updated_at = Utc::now();
        self.store_mut().put(record.clone())?;
        Ok(record)
    }

    /// Delete a record and all links incident to it. Idempotent.
    pub fn delete(&mut self, id: &RecordId) -> Result<bool, CaptureError> {
        self.store_mut().remove(id)
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Link two records. Both must exist; a duplicate link in either
    /// orientation is a no-op, not an error.
    pub fn link(&mut self, a: &RecordId, b: &RecordId) -> Result<(), CaptureError> {
        self.require(a)?;
        self.require(b)?;
        self.store_mut().insert_link(a, b, Utc::now())
    }

    /// Remove the link between two records, in either orientation.
    pub fn unlink(&mut self, a: &RecordId, b: &RecordId) -> Result<bool, CaptureError> {
        self.store_mut().remove_link(a, b)
    }

    /// All records exactly one edge away from `id`, either orientation.
    pub fn linked(&self, id: &RecordId) -> Result<Vec<Record>, CaptureError> {
        self.require(id)?;
        let mut records = Vec::new();
        for neighbor in self.store().neighbor_ids(id)? {
            if let Some(record) = self.store().fetch(&neighbor)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Search records, most-recently-updated first, capped at one page.
    pub fn find(&self, filter: &RecordFilter) -> Result<Vec<Record>, CaptureError> {
        let mut records: Vec<Record> = self
            .store()
            .scan()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(FIND_PAGE_LIMIT);
        Ok(records)
    }

    /// All records created in a session, newest first.
    pub fn list_by_session(&self, session_id: &str) -> Result<Vec<Record>, CaptureError> {
        let mut records: Vec<Record> = self
            .store()
            .scan()?
            .into_iter()
            .filter(|r| r.session_id == session_id)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Record, link, and session counts, for status displays.
    pub fn stats(&self) -> Result<CatalogStats, CaptureError> {
        let store = self.store();
        let mut sessions: Vec<String> = store.scan()?.into_iter().map(|r| r.session_id).collect();
        sessions.extend(store.turns()?.into_iter().map(|t| t.session_id));
        sessions.sort();
        sessions.dedup();
        Ok(CatalogStats {
            record_count: store.record_count()?,
            link_count: store.link_count()?,
            session_count: sessions.len(),
        })
    }

    // =========================================================================
    // SESSIONS & CONVERSATION HISTORY
    // =========================================================================

    /// Persist a single conversation turn.
    pub fn save_turn(
        &mut self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> Result<(), CaptureError> {
        self.store_mut().append_turn(ConversationTurn {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Full conversation history for a session, oldest first.
    pub fn history(&self, session_id: &str) -> Result<Vec<ConversationTurn>, CaptureError> {
        let mut turns: Vec<ConversationTurn> = self
            .store()
            .turns()?
            .into_iter()
            .filter(|t| t.session_id == session_id)
            .collect();
        turns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(turns)
    }

    /// All conversation sessions with activity summaries, most recently
    /// active first.
    pub fn sessions(&self) -> Result<Vec<SessionSummary>, CaptureError> {
        let mut grouped: BTreeMap<String, SessionSummary> = BTreeMap::new();
        for turn in self.store().turns()? {
            let entry = grouped
                .entry(turn.session_id.clone())
                .or_insert_with(|| SessionSummary {
                    session_id: turn.session_id.clone(),
                    created_at: turn.created_at,
                    last_active: turn.created_at,
                    message_count: 0,
                    first_message: None,
                });
            entry.message_count += 1;
            entry.created_at = entry.created_at.min(turn.created_at);
            entry.last_active = entry.last_active.max(turn.created_at);
            if entry.first_message.is_none() && turn.role == TurnRole::User {
                entry.first_message = Some(turn.content);
            }
        }
        let mut summaries: Vec<SessionSummary> = grouped.into_values().collect();
        summaries.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(summaries)
    }

    /// Remove all records and conversation turns for a session.
    /// Returns whether anything existed.
    pub fn delete_session(&mut self, session_id: &str) -> Result<bool, CaptureError> {
        self.store_mut().remove_session(session_id)
    }
}

/// Aggregate counts for status displays.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CatalogStats {
    pub record_count: usize,
    pub link_count: usize,
    pub session_count: usize,
}

// =============================================================================
// TESTS
// =============================================================================
