//! # Persistent Storage
//!
//! Disk-backed record storage using the redb embedded database.

mod redb_store;

pub use redb_store::RedbStore;
