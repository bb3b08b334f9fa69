//! # Record Store
//!
//! The storage primitives behind the record graph: typed records, an
//! undirected link graph, and per-session conversation turns.
//!
//! This module defines the `RecordStore` trait and the in-memory
//! implementation. The disk-backed redb implementation lives in
//! `storage::RedbStore`; both are driven through the same trait by the
//! `Catalog` wrapper, which owns the domain logic (merging, naming,
//! paging, ordering).
//!
//! ## Link Invariant
//!
//! Links are undirected and unique per unordered pair. Every implementation
//! stores the pair in canonical (lexicographic) order, so `(a, b)` and
//! `(b, a)` address the same edge and a duplicate insert is a no-op.

use crate::types::{CaptureError, ConversationTurn, Record, RecordId, RecordType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// RECORDSTORE TRAIT
// =============================================================================

/// Storage primitives shared by the in-memory and persistent backends.
///
/// Each mutation is atomic relative to a single call: a record write or
/// link insert either fully applies or fully fails.
pub trait RecordStore {
    /// Insert or overwrite a record keyed by its id.
    fn put(&mut self, record: Record) -> Result<(), CaptureError>;

    /// Fetch a record by id.
    fn fetch(&self, id: &RecordId) -> Result<Option<Record>, CaptureError>;

    /// Remove a record and all links incident to it.
    /// Returns false (not an error) if the record was absent.
    fn remove(&mut self, id: &RecordId) -> Result<bool, CaptureError>;

    /// All records, in unspecified order. Callers sort and page.
    fn scan(&self) -> Result<Vec<Record>, CaptureError>;

    /// Total number of stored records.
    fn record_count(&self) -> Result<usize, CaptureError>;

    /// Insert an undirected link. A duplicate in either orientation is a
    /// no-op, never an error.
    fn insert_link(
        &mut self,
        a: &RecordId,
        b: &RecordId,
        created_at: DateTime<Utc>,
    ) -> Result<(), CaptureError>;

    /// Remove the link between two records, in either orientation.
    /// Returns whether an edge existed.
    fn remove_link(&mut self, a: &RecordId, b: &RecordId) -> Result<bool, CaptureError>;

    /// Ids of all records exactly one edge away from `id`.
    fn neighbor_ids(&self, id: &RecordId) -> Result<Vec<RecordId>, CaptureError>;

    /// Total number of stored links.
    fn link_count(&self) -> Result<usize, CaptureError>;

    /// Append a conversation turn.
    fn append_turn(&mut self, turn: ConversationTurn) -> Result<(), CaptureError>;

    /// All conversation turns, in append order.
    fn turns(&self) -> Result<Vec<ConversationTurn>, CaptureError>;

    /// Remove every record and conversation turn belonging to a session.
    /// Returns whether anything existed.
    fn remove_session(&mut self, session_id: &str) -> Result<bool, CaptureError>;
}

// =============================================================================
// CANONICAL LINK KEYS
// =============================================================================

/// Order a pair of record ids canonically so both orientations of an
/// undirected edge map to the same key.
#[must_use]
pub fn canonical_pair(a: &RecordId, b: &RecordId) -> (RecordId, RecordId) {
    if a.as_str() <= b.as_str() {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

// =============================================================================
// SHALLOW MERGE
// =============================================================================

/// Shallow-merge `incoming` onto `existing`: top-level keys of `incoming`
/// replace (never recursively combine with) keys of `existing`.
///
/// When either side is not an object the incoming value wins outright,
/// matching last-write-wins semantics for non-document payloads.
#[must_use]
pub fn shallow_merge(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Object(base), Value::Object(updates)) => {
            let mut merged = base.clone();
            for (key, value) in updates {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

// =============================================================================
// NAME DERIVATION
// =============================================================================

/// Derive a display name from record data using per-type heuristics.
///
/// Re-deriving from the same data always yields the same name. Types
/// without a heuristic return None and keep whatever name they had.
#[must_use]
pub fn derive_name(record_type: RecordType, data: &Value) -> Option<String> {
    let get_str = |key: &str| -> Option<String> {
        data.get(key).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    match record_type {
        RecordType::Subject => {
            let subject_id = get_str("subject_id")?;
            let species_name = data
                .get("species")
                .and_then(|s| s.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if species_name.is_empty() {
                Some(subject_id)
            } else {
                Some(format!("{species_name} {subject_id}"))
            }
        }
        RecordType::Instrument => get_str("instrument_id").or_else(|| get_str("name")),
        RecordType::Rig => get_str("rig_id").or_else(|| get_str("name")),
        RecordType::Procedures => get_str("procedure_type"),
        RecordType::DataDescription => get_str("project_name"),
        RecordType::Session => get_str("session_start_time").map(|start| format!("Session {start}")),
        RecordType::Acquisition | RecordType::Processing | RecordType::QualityControl => None,
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Volatile `BTreeMap`-backed store.
///
/// The default backend for tests and the `memory` CLI backend; nothing
/// survives process exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Record storage: id -> record.
    records: BTreeMap<RecordId, Record>,
    /// Undirected links keyed by canonical pair.
    links: BTreeMap<(RecordId, RecordId), DateTime<Utc>>,
    /// Conversation turns in append order.
    turns: Vec<ConversationTurn>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn put(&mut self, record: Record) -> Result<(), CaptureError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &RecordId) -> Result<Option<Record>, CaptureError> {
        Ok(self.records.get(id).cloned())
    }

    fn remove(&mut self, id: &RecordId) -> Result<bool, CaptureError> {
        let existed = self.records.remove(id).is_some();
        if existed {
            self.links
                .retain(|(a, b), _| a != id && b != id);
        }
        Ok(existed)
    }

    fn scan(&self) -> Result<Vec<Record>, CaptureError> {
        Ok(self.records.values().cloned().collect())
    }

    fn record_count(&self) -> Result<usize, CaptureError> {
        Ok(self.records.len())
    }

    fn insert_link(
        &mut self,
        a: &RecordId,
        b: &RecordId,
        created_at: DateTime<Utc>,
    ) -> Result<(), CaptureError> {
        self.links.entry(canonical_pair(a, b)).or_insert(created_at);
        Ok(())
    }

    fn remove_link(&mut self, a: &RecordId, b: &RecordId) -> Result<bool, CaptureError> {
        Ok(self.links.remove(&canonical_pair(a, b)).is_some())
    }

    fn neighbor_ids(&self, id: &RecordId) -> Result<Vec<RecordId>, CaptureError> {
        let mut neighbors = Vec::new();
        for (a, b) in self.links.keys() {
            if a == id {
                neighbors.push(b.clone());
            } else if b == id {
                neighbors.push(a.clone());
            }
        }
        Ok(neighbors)
    }

    fn link_count(&self) -> Result<usize, CaptureError> {
        Ok(self.links.len())
    }

    fn append_turn(&mut self, turn: ConversationTurn) -> Result<(), CaptureError> {
        self.turns.push(turn);
        Ok(())
    }

    fn turns(&self) -> Result<Vec<ConversationTurn>, CaptureError> {
        Ok(self.turns.clone())
    }

    fn remove_session(&mut self, session_id: &str) -> Result<bool, CaptureError> {
        let doomed: Vec<RecordId> = self
            .records
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.id.clone())
            .collect();
        for id in &doomed {
            self.remove(id)?;
        }

        let turn_count_before = self.turns.len();
        self.turns.retain(|t| t.session_id != session_id);

        Ok(!doomed.is_empty() || self.turns.len() != turn_count_before)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, RecordStatus, TurnRole};
    use serde_json::json;

    fn make_record(session: &str, record_type: RecordType, data: Value) -> Record {
        let now = Utc::now();
        Record {
            id: RecordId::generate(),
            session_id: session.to_string(),
            record_type,
            category: record_type.category(),
            name: None,
            data,
            status: RecordStatus::Draft,
            validation: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn put_and_fetch_roundtrip() {
        let mut store = MemoryStore::new();
        let record = make_record("s1", RecordType::Subject, json!({"subject_id": "5534"}));
        let id = record.id.clone();

        store.put(record).expect("put");
        let fetched = store.fetch(&id).expect("fetch").expect("present");
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.category, Category::Shared);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = MemoryStore::new();
        let record = make_record("s1", RecordType::Subject, json!({}));
        let id = record.id.clone();
        store.put(record).expect("put");

        assert!(store.remove(&id).expect("remove"));
        assert!(!store.remove(&id).expect("remove again"));
    }

    #[test]
    fn link_is_unordered_and_unique() {
        let mut store = MemoryStore::new();
        let a = make_record("s1", RecordType::Subject, json!({}));
        let b = make_record("s1", RecordType::Session, json!({}));
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.put(a).expect("put");
        store.put(b).expect("put");

        store.insert_link(&a_id, &b_id, Utc::now()).expect("link");
        store.insert_link(&b_id, &a_id, Utc::now()).expect("reverse link");

        assert_eq!(store.link_count().expect("count"), 1);
        let neighbors = store.neighbor_ids(&a_id).expect("neighbors");
        assert_eq!(neighbors, vec![b_id]);
    }

    #[test]
    fn remove_cascades_links() {
        let mut store = MemoryStore::new();
        let a = make_record("s1", RecordType::Subject, json!({}));
        let b = make_record("s1", RecordType::Session, json!({}));
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.put(a).expect("put");
        store.put(b).expect("put");
        store.insert_link(&a_id, &b_id, Utc::now()).expect("link");

        store.remove(&a_id).expect("remove");
        assert_eq!(store.link_count().expect("count"), 0);
        assert!(store.neighbor_ids(&b_id).expect("neighbors").is_empty());
    }

    #[test]
    fn unlink_works_in_either_orientation() {
        let mut store = MemoryStore::new();
        let a = make_record("s1", RecordType::Subject, json!({}));
        let b = make_record("s1", RecordType::Session, json!({}));
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.put(a).expect("put");
        store.put(b).expect("put");

        store.insert_link(&a_id, &b_id, Utc::now()).expect("link");
        assert!(store.remove_link(&b_id, &a_id).expect("unlink"));
        assert!(!store.remove_link(&a_id, &b_id).expect("unlink again"));
    }

    #[test]
    fn remove_session_takes_records_and_turns() {
        let mut store = MemoryStore::new();
        let keep = make_record("other", RecordType::Subject, json!({}));
        let doomed = make_record("gone", RecordType::Subject, json!({}));
        store.put(keep.clone()).expect("put");
        store.put(doomed).expect("put");
        store
            .append_turn(ConversationTurn {
                session_id: "gone".to_string(),
                role: TurnRole::User,
                content: "hello".to_string(),
                created_at: Utc::now(),
            })
            .expect("turn");

        assert!(store.remove_session("gone").expect("remove"));
        assert_eq!(store.record_count().expect("count"), 1);
        assert!(store.turns().expect("turns").is_empty());
        assert!(!store.remove_session("gone").expect("remove again"));
        assert!(store.fetch(&keep.id).expect("fetch").is_some());
    }

    #[test]
    fn shallow_merge_overrides_without_recursing() {
        let existing = json!({"subject_id": "5534", "housing": {"cage": "C1", "room": "R2"}});
        let incoming = json!({"housing": {"cage": "C9"}, "sex": "Male"});

        let merged = shallow_merge(&existing, &incoming);

        assert_eq!(merged["subject_id"], "5534");
        assert_eq!(merged["sex"], "Male");
        // Top-level replacement, not deep merge: "room" is gone.
        assert_eq!(merged["housing"], json!({"cage": "C9"}));
    }

    #[test]
    fn shallow_merge_non_object_replaces() {
        let merged = shallow_merge(&json!({"a": 1}), &json!("flat"));
        assert_eq!(merged, json!("flat"));
    }

    #[test]
    fn derive_name_subject_with_species() {
        let name = derive_name(
            RecordType::Subject,
            &json!({"subject_id": "4528", "species": {"name": "Mus musculus"}}),
        );
        assert_eq!(name.as_deref(), Some("Mus musculus 4528"));
    }

    #[test]
    fn derive_name_subject_without_species() {
        let name = derive_name(RecordType::Subject, &json!({"subject_id": 4528}));
        assert_eq!(name.as_deref(), Some("4528"));
    }

    #[test]
    fn derive_name_is_idempotent() {
        let data = json!({"project_name": "BrainMap"});
        let first = derive_name(RecordType::DataDescription, &data);
        let second = derive_name(RecordType::DataDescription, &data);
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("BrainMap"));
    }

    #[test]
    fn derive_name_per_type_heuristics() {
        assert_eq!(
            derive_name(RecordType::Rig, &json!({"rig_id": "rig-001"})).as_deref(),
            Some("rig-001")
        );
        assert_eq!(
            derive_name(RecordType::Instrument, &json!({"name": "SmartSPIM-2"})).as_deref(),
            Some("SmartSPIM-2")
        );
        assert_eq!(
            derive_name(
                RecordType::Session,
                &json!({"session_start_time": "2025-01-15T09:00:00"})
            )
            .as_deref(),
            Some("Session 2025-01-15T09:00:00")
        );
        assert_eq!(derive_name(RecordType::Processing, &json!({"x": 1})), None);
    }
}
