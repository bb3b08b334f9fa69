//! # Registry Correlation
//!
//! Opportunistic cross-referencing of free-text record fields (genotypes,
//! allele names, plasmid identifiers) against external biological
//! registries.
//!
//! The subsystem is best-effort by design: lookups run concurrently with
//! per-call and overall deadlines, a failed or abandoned call is logged
//! and omitted, and nothing here ever aborts a capture operation.
//!
//! Backends are injected per registry; this crate defines the trait and
//! the orchestration, the app layer supplies the HTTP implementations.

mod extract;
mod lookup;

pub use extract::extract_queries;
pub use lookup::{LookupOptions, run_lookups};

use crate::primitives::MAX_SUMMARY_ENTRIES;
use crate::types::{LookupOutcome, Registry, RegistryEntry, RegistryLookupResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// BACKEND TRAIT & PROVIDER
// =============================================================================

/// A hard lookup failure: the call itself could not complete.
///
/// Hard failures are omitted from the result set (logged upstream).
/// Registry-level misses and soft errors are expressed through
/// `LookupOutcome` instead and carried into the results.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// One pluggable registry lookup function.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Look a single query up in this registry.
    async fn lookup(&self, query: &str) -> Result<LookupOutcome, LookupError>;
}

/// The registry lookup provider: one backend per registry.
///
/// A registry with no registered backend contributes nothing; queries
/// against it are skipped silently.
#[derive(Clone, Default)]
pub struct RegistryProvider {
    backends: BTreeMap<Registry, Arc<dyn RegistryBackend>>,
}

impl std::fmt::Debug for RegistryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryProvider")
            .field("registries", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RegistryProvider {
    /// Create an empty provider (all lookups become no-ops).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend for a registry, replacing any previous one.
    #[must_use]
    pub fn with_backend(mut self, registry: Registry, backend: Arc<dyn RegistryBackend>) -> Self {
        self.backends.insert(registry, backend);
        self
    }

    /// Get the backend for a registry, if one is registered.
    #[must_use]
    pub fn backend(&self, registry: Registry) -> Option<Arc<dyn RegistryBackend>> {
        self.backends.get(&registry).cloned()
    }

    /// Whether any backend is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

// =============================================================================
// SUMMARY FORMATTING
// =============================================================================

/// Render lookup results as text for the conversational layer to relay.
///
/// Pure display transform: every entry passed in is reflected in the
/// output (found, not-found, and soft-error states alike); only the
/// per-result detail lines are capped.
#[must_use]
pub fn format_summary(results: &[RegistryLookupResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut lines = vec!["REGISTRY LOOKUPS:".to_string()];
    for result in results {
        let registry = result.registry.display_name();
        let query = &result.query;

        if let Some(error) = &result.error {
            lines.push(format!("  - {registry} '{query}': lookup failed ({error})"));
        } else if result.found {
            if result.results.is_empty() {
                lines.push(format!("  - {registry} '{query}': FOUND"));
            } else {
                for entry in result.results.iter().take(MAX_SUMMARY_ENTRIES) {
                    lines.push(format_entry(registry, query, entry));
                }
            }
        } else {
            lines.push(format!(
                "  - {registry} '{query}': NOT FOUND - could not verify in external registry"
            ));
        }
    }

    lines.push(String::new());
    lines.push(
        "Share these registry results with the user to confirm the identifiers are correct."
            .to_string(),
    );
    lines.join("\n")
}

fn format_entry(registry: &str, query: &str, entry: &RegistryEntry) -> String {
    match entry {
        RegistryEntry::Gene {
            symbol,
            description,
            url,
            ..
        } => format!("  - {registry} '{query}': FOUND - {symbol} ({description}) {url}"),
        RegistryEntry::Plasmid {
            catalog_number,
            name,
            description,
            url,
        } => {
            let description_part = if description.is_empty() {
                String::new()
            } else {
                format!(" - {description}")
            };
            format!("  - {registry} '{query}': FOUND - #{catalog_number} {name}{description_part} {url}")
        }
        RegistryEntry::Reference { url } => {
            format!("  - {registry} '{query}': FOUND - {url}")
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(
        registry: Registry,
        query: &str,
        outcome: LookupOutcome,
    ) -> RegistryLookupResult {
        RegistryLookupResult::from_outcome(registry, query, outcome)
    }

    #[test]
    fn empty_results_render_nothing() {
        assert_eq!(format_summary(&[]), "");
    }

    #[test]
    fn found_reference_shows_url() {
        let results = vec![result_with(
            Registry::Mgi,
            "Ai14",
            LookupOutcome::found(vec![RegistryEntry::Reference {
                url: "https://www.informatics.jax.org/quicksearch/summary?query=Ai14".into(),
            }]),
        )];
        let summary = format_summary(&results);
        assert!(summary.contains("REGISTRY LOOKUPS"));
        assert!(summary.contains("MGI 'Ai14': FOUND"));
        assert!(summary.contains("informatics.jax.org"));
    }

    #[test]
    fn not_found_renders_explicitly() {
        let results = vec![result_with(
            Registry::NcbiGene,
            "FakeGene",
            LookupOutcome::not_found(),
        )];
        let summary = format_summary(&results);
        assert!(summary.contains("NOT FOUND"));
        assert!(summary.contains("FakeGene"));
    }

    #[test]
    fn soft_error_renders_as_failure() {
        let results = vec![result_with(
            Registry::Addgene,
            "pAAV",
            LookupOutcome::failure("timeout"),
        )];
        let summary = format_summary(&results);
        assert!(summary.contains("lookup failed"));
        assert!(summary.contains("timeout"));
    }

    #[test]
    fn gene_entries_show_symbol_and_description() {
        let results = vec![result_with(
            Registry::NcbiGene,
            "Slc17a7",
            LookupOutcome::found(vec![RegistryEntry::Gene {
                gene_id: "140919".into(),
                symbol: "Slc17a7".into(),
                description: "vesicular glutamate transporter".into(),
                organism: "Mus musculus".into(),
                url: "https://www.ncbi.nlm.nih.gov/gene/140919".into(),
            }]),
        )];
        let summary = format_summary(&results);
        assert!(summary.contains("Slc17a7"));
        assert!(summary.contains("vesicular glutamate"));
    }

    #[test]
    fn plasmid_entries_show_catalog_numbers() {
        let results = vec![result_with(
            Registry::Addgene,
            "AAV11",
            LookupOutcome::found(vec![
                RegistryEntry::Plasmid {
                    catalog_number: "240486".into(),
                    name: "pAAV2/11".into(),
                    description: "AAV packaging plasmid expressing AAV2 Rep and AAV11 capsid"
                        .into(),
                    url: "https://www.addgene.org/240486/".into(),
                },
                RegistryEntry::Plasmid {
                    catalog_number: "50465".into(),
                    name: "pAAV-hSyn-EGFP".into(),
                    description: String::new(),
                    url: "https://www.addgene.org/50465/".into(),
                },
            ]),
        )];
        let summary = format_summary(&results);
        assert!(summary.contains("#240486"));
        assert!(summary.contains("pAAV2/11"));
        assert!(summary.contains("#50465"));
        assert!(summary.contains("pAAV-hSyn-EGFP"));
        assert!(summary.contains("AAV packaging plasmid"));
    }

    #[test]
    fn detail_lines_are_capped_per_result() {
        let entries: Vec<RegistryEntry> = (0..10)
            .map(|i| RegistryEntry::Plasmid {
                catalog_number: format!("1000{i}"),
                name: format!("plasmid{i}"),
                description: String::new(),
                url: format!("https://www.addgene.org/1000{i}/"),
            })
            .collect();
        let results = vec![result_with(
            Registry::Addgene,
            "pAAV",
            LookupOutcome::found(entries),
        )];
        let summary = format_summary(&results);
        let detail_lines = summary.matches("FOUND").count();
        assert_eq!(detail_lines, MAX_SUMMARY_ENTRIES);
    }

    #[test]
    fn every_result_is_reflected() {
        let results = vec![
            result_with(Registry::Mgi, "Ai14", LookupOutcome::not_found()),
            result_with(Registry::NcbiGene, "Ai14", LookupOutcome::not_found()),
            result_with(Registry::Mgi, "Slc17a7-Cre", LookupOutcome::not_found()),
        ];
        let summary = format_summary(&results);
        assert_eq!(summary.matches("NOT FOUND").count(), 3);
    }
}
