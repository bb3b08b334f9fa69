//! # Primitives
//!
//! Shared numeric bounds for the capture engine.
//!
//! Every bound that shapes observable behavior lives here so the store,
//! registry, and correlator agree on one value.

/// Maximum number of records returned by a single `find` call.
pub const FIND_PAGE_LIMIT: usize = 50;

/// Minimum length of a genotype/allele token worth looking up.
/// Tokens of length 2 or less ("wt", "KO") are noise, not identifiers.
pub const MIN_QUERY_TOKEN_LEN: usize = 3;

/// Addgene catalog numbers are 4-6 digits; anything at or below this
/// threshold is more likely a year fragment or measurement.
pub const MIN_ADDGENE_CATALOG: u32 = 1000;

/// Per-call registry lookup timeout, in seconds.
pub const DEFAULT_PER_CALL_TIMEOUT_SECS: u64 = 15;

/// Overall deadline across one capture's registry fan-out, in seconds.
pub const DEFAULT_OVERALL_TIMEOUT_SECS: u64 = 20;

/// Capacity of the per-turn validation event channel.
///
/// Bounded but effectively unblocking: publishers use `try_send`, so a
/// full channel drops the event rather than stalling a store write.
pub const TURN_EVENT_CAPACITY: usize = 64;

/// Maximum detail lines rendered per lookup result in a registry summary.
pub const MAX_SUMMARY_ENTRIES: usize = 4;
