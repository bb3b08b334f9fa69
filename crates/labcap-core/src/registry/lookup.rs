//! # Concurrent Lookup Execution
//!
//! Fans extracted queries out across registry backends with per-call and
//! overall deadlines. Failures degrade to omission; nothing here ever
//! propagates an error to the capture operation.

use super::RegistryProvider;
use crate::primitives::{DEFAULT_OVERALL_TIMEOUT_SECS, DEFAULT_PER_CALL_TIMEOUT_SECS};
use crate::types::{Registry, RegistryLookupResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

// =============================================================================
// OPTIONS
// =============================================================================

/// Deadlines for one capture's registry fan-out.
#[derive(Debug, Clone, Copy)]
pub struct LookupOptions {
    /// Budget for each individual registry call.
    pub per_call_timeout: Duration,
    /// Cap on total wait across all calls, regardless of per-call
    /// progress. Calls still pending at the deadline are abandoned.
    pub overall_timeout: Duration,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(DEFAULT_PER_CALL_TIMEOUT_SECS),
            overall_timeout: Duration::from_secs(DEFAULT_OVERALL_TIMEOUT_SECS),
        }
    }
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Execute all extracted queries concurrently.
///
/// Each query runs against its registry's backend with the per-call
/// timeout; a failing or timed-out call is logged and omitted while its
/// siblings proceed. The overall deadline bounds total wait; anything
/// unfinished at that point is abandoned. No retries. Results come back
/// in spawn order (registry order, then query order within a registry).
pub async fn run_lookups(
    provider: &RegistryProvider,
    queries: BTreeMap<Registry, Vec<String>>,
    options: &LookupOptions,
) -> Vec<RegistryLookupResult> {
    let mut tasks: JoinSet<(usize, Registry, String, Option<RegistryLookupResult>)> =
        JoinSet::new();
    let mut spawned = 0usize;

    for (registry, terms) in queries {
        let Some(backend) = provider.backend(registry) else {
            continue;
        };
        for term in terms {
            let backend = Arc::clone(&backend);
            let per_call = options.per_call_timeout;
            let index = spawned;
            spawned += 1;
            tasks.spawn(async move {
                let outcome = tokio::time::timeout(per_call, backend.lookup(&term)).await;
                let result = match outcome {
                    Ok(Ok(outcome)) => Some(RegistryLookupResult::from_outcome(
                        registry, &term, outcome,
                    )),
                    Ok(Err(error)) => {
                        tracing::warn!(
                            registry = registry.as_str(),
                            query = %term,
                            %error,
                            "registry lookup failed"
                        );
                        None
                    }
                    Err(_) => {
                        tracing::warn!(
                            registry = registry.as_str(),
                            query = %term,
                            "registry lookup timed out"
                        );
                        None
                    }
                };
                (index, registry, term, result)
            });
        }
    }

    if spawned == 0 {
        return Vec::new();
    }

    let mut slots: Vec<Option<RegistryLookupResult>> = vec![None; spawned];
    let drained = tokio::time::timeout(options.overall_timeout, async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, _, result)) => slots[index] = result,
                Err(error) => {
                    tracing::warn!(%error, "registry lookup task aborted");
                }
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!("registry lookups exceeded overall deadline; abandoning stragglers");
        tasks.abort_all();
    }

    slots.into_iter().flatten().collect()
}

// =============================================================================
// TESTS
// =============================================================================
