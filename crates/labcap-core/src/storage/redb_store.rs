//! # redb-backed Record Storage
//!
//! A disk-backed record store using the redb embedded database,
//! providing:
//! - ACID transactions (a record write or link insert is all-or-nothing)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Layout
//!
//! Records and conversation turns are stored as JSON bytes: record
//! payloads are schemaless nested documents, so the value encoding must
//! be self-describing. Links are keyed by the canonical (lexicographic)
//! orientation of the pair, which makes the unordered-uniqueness
//! invariant a plain key-uniqueness property of the table.

use crate::store::{RecordStore, canonical_pair};
use crate::types::{CaptureError, ConversationTurn, Record, RecordId};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for records: record id -> JSON-serialized Record bytes.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Table for links: canonical (low id, high id) -> RFC 3339 created_at.
const LINKS: TableDefinition<(&str, &str), &str> = TableDefinition::new("links");

/// Table for conversation turns: sequence number -> JSON-serialized turn.
const TURNS: TableDefinition<u64, &[u8]> = TableDefinition::new("turns");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed record store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Next conversation-turn sequence number.
    next_turn_seq: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("next_turn_seq", &self.next_turn_seq)
            .finish_non_exhaustive()
    }
}

fn io_err(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CaptureError> {
    serde_json::to_vec(value).map_err(|e| CaptureError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CaptureError> {
    serde_json::from_slice(bytes).map_err(|e| CaptureError::Serialization(e.to_string()))
}

impl RedbStore {
    /// Open or create a record database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(io_err)?;
            let _ = write_txn.open_table(LINKS).map_err(io_err)?;
            let _ = write_txn.open_table(TURNS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let read_txn = db.begin_read().map_err(io_err)?;
        let next_turn_seq = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get("next_turn_seq")
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        Ok(Self { db, next_turn_seq })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), CaptureError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    /// Remove every link incident to `id` inside an open links table.
    fn purge_links(
        table: &mut redb::Table<'_, (&'static str, &'static str), &'static str>,
        id: &RecordId,
    ) -> Result<(), CaptureError> {
        let mut doomed: Vec<(String, String)> = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            let (a, b) = key.value();
            if a == id.as_str() || b == id.as_str() {
                doomed.push((a.to_string(), b.to_string()));
            }
        }
        for (a, b) in doomed {
            table.remove((a.as_str(), b.as_str())).map_err(io_err)?;
        }
        Ok(())
    }
}

// =============================================================================
// RECORDSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl RecordStore for RedbStore {
    fn put(&mut self, record: Record) -> Result<(), CaptureError> {
        let bytes = encode(&record)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(io_err)?;
            table
                .insert(record.id.as_str(), bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn fetch(&self, id: &RecordId) -> Result<Option<Record>, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;
        match table.get(id.as_str()).map_err(io_err)? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn remove(&mut self, id: &RecordId) -> Result<bool, CaptureError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed;
        {
            let mut records = write_txn.open_table(RECORDS).map_err(io_err)?;
            existed = records.remove(id.as_str()).map_err(io_err)?.is_some();
            if existed {
                let mut links = write_txn.open_table(LINKS).map_err(io_err)?;
                Self::purge_links(&mut links, id)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn scan(&self) -> Result<Vec<Record>, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn record_count(&self) -> Result<usize, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(RECORDS).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn insert_link(
        &mut self,
        a: &RecordId,
        b: &RecordId,
        created_at: DateTime<Utc>,
    ) -> Result<(), CaptureError> {
        let (low, high) = canonical_pair(a, b);
        let stamp = created_at.to_rfc3339();

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(LINKS).map_err(io_err)?;
            let exists = table
                .get((low.as_str(), high.as_str()))
                .map_err(io_err)?
                .is_some();
            if !exists {
                table
                    .insert((low.as_str(), high.as_str()), stamp.as_str())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn remove_link(&mut self, a: &RecordId, b: &RecordId) -> Result<bool, CaptureError> {
        let (low, high) = canonical_pair(a, b);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let existed;
        {
            let mut table = write_txn.open_table(LINKS).map_err(io_err)?;
            existed = table
                .remove((low.as_str(), high.as_str()))
                .map_err(io_err)?
                .is_some();
        }
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn neighbor_ids(&self, id: &RecordId) -> Result<Vec<RecordId>, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(LINKS).map_err(io_err)?;

        let mut neighbors = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            let (a, b) = key.value();
            if a == id.as_str() {
                neighbors.push(RecordId::new(b));
            } else if b == id.as_str() {
                neighbors.push(RecordId::new(a));
            }
        }
        Ok(neighbors)
    }

    fn link_count(&self) -> Result<usize, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(LINKS).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn append_turn(&mut self, turn: ConversationTurn) -> Result<(), CaptureError> {
        let bytes = encode(&turn)?;
        let seq = self.next_turn_seq;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut turns = write_txn.open_table(TURNS).map_err(io_err)?;
            turns.insert(seq, bytes.as_slice()).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert("next_turn_seq", seq.saturating_add(1))
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        // Update in-memory state only after successful commit.
        self.next_turn_seq = seq.saturating_add(1);
        Ok(())
    }

    fn turns(&self) -> Result<Vec<ConversationTurn>, CaptureError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TURNS).map_err(io_err)?;

        let mut turns = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            turns.push(decode(value.value())?);
        }
        Ok(turns)
    }

    fn remove_session(&mut self, session_id: &str) -> Result<bool, CaptureError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let mut removed_any = false;
        {
            let mut records = write_txn.open_table(RECORDS).map_err(io_err)?;
            let mut doomed: Vec<RecordId> = Vec::new();
            for entry in records.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let record: Record = decode(value.value())?;
                if record.session_id == session_id {
                    doomed.push(record.id);
                }
            }
            let mut links = write_txn.open_table(LINKS).map_err(io_err)?;
            for id in &doomed {
                records.remove(id.as_str()).map_err(io_err)?;
                Self::purge_links(&mut links, id)?;
                removed_any = true;
            }

            let mut turns = write_txn.open_table(TURNS).map_err(io_err)?;
            let mut doomed_turns: Vec<u64> = Vec::new();
            for entry in turns.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                let turn: ConversationTurn = decode(value.value())?;
                if turn.session_id == session_id {
                    doomed_turns.push(key.value());
                }
            }
            for seq in doomed_turns {
                turns.remove(seq).map_err(io_err)?;
                removed_any = true;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(removed_any)
    }
}

// =============================================================================
// TESTS
// =============================================================================
