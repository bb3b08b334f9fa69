//! # Query Extraction
//!
//! Identifies lookup-worthy substrings in record data and maps them to
//! the registries that can resolve them.
//!
//! Extraction is type-specific: subject genotypes and alleles feed the
//! gene databases; procedures data is scanned whole for plasmid names
//! and catalog numbers, regardless of nesting depth.

use crate::primitives::{MIN_ADDGENE_CATALOG, MIN_QUERY_TOKEN_LEN};
use crate::types::{Registry, RecordType};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Composite genotypes like "Ai14;Slc17a7-Cre" or "Emx1-Cre/Ai94" split
/// into individual allele tokens.
static GENOTYPE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;/×]\s*").expect("static pattern"));

/// Plasmid/vector names: a known prefix followed by more of the name.
static PLASMID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:pAAV|AAV|pCAG|pEF|pCMV)[-\w]+").expect("static pattern"));

/// Candidate Addgene catalog numbers: 4-6 digit runs.
static CATALOG_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,6}\b").expect("static pattern"));

/// Extract registry queries from record data.
///
/// Returns registry -> ordered, deduplicated query strings. Deduplication
/// is per registry and preserves first-seen order.
#[must_use]
pub fn extract_queries(record_type: RecordType, data: &Value) -> BTreeMap<Registry, Vec<String>> {
    let mut queries: BTreeMap<Registry, Vec<String>> = BTreeMap::new();

    match record_type {
        RecordType::Subject => {
            extract_genotype(data, &mut queries);
            extract_alleles(data, &mut queries);
        }
        RecordType::Procedures => {
            extract_plasmids(data, &mut queries);
        }
        _ => {}
    }

    queries
}

/// Register a query, preserving first-seen order per registry.
fn push_unique(queries: &mut BTreeMap<Registry, Vec<String>>, registry: Registry, term: &str) {
    let terms = queries.entry(registry).or_default();
    if !terms.iter().any(|t| t == term) {
        terms.push(term.to_string());
    }
}

fn extract_genotype(data: &Value, queries: &mut BTreeMap<Registry, Vec<String>>) {
    let Some(genotype) = data.get("genotype").and_then(Value::as_str) else {
        return;
    };
    if genotype.len() < MIN_QUERY_TOKEN_LEN {
        return;
    }
    for token in GENOTYPE_SEPARATORS.split(genotype) {
        let token = token.trim();
        if token.len() >= MIN_QUERY_TOKEN_LEN {
            push_unique(queries, Registry::Mgi, token);
            push_unique(queries, Registry::NcbiGene, token);
        }
    }
}

fn extract_alleles(data: &Value, queries: &mut BTreeMap<Registry, Vec<String>>) {
    let Some(alleles) = data.get("alleles").and_then(Value::as_array) else {
        return;
    };
    for allele in alleles {
        let name = match allele {
            Value::Object(map) => map.get("name").and_then(Value::as_str),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        };
        if let Some(name) = name
            && name.len() >= MIN_QUERY_TOKEN_LEN
        {
            push_unique(queries, Registry::Mgi, name);
        }
    }
}

fn extract_plasmids(data: &Value, queries: &mut BTreeMap<Registry, Vec<String>>) {
    // Serialize the whole document so plasmid names are caught regardless
    // of nesting (e.g. subject_procedures[].injection_materials[].name).
    let Ok(flat) = serde_json::to_string(data) else {
        return;
    };

    for capture in PLASMID_NAME.find_iter(&flat) {
        push_unique(queries, Registry::Addgene, capture.as_str());
    }

    for capture in CATALOG_NUMBER.find_iter(&flat) {
        if let Ok(number) = capture.as_str().parse::<u32>()
            && number > MIN_ADDGENE_CATALOG
        {
            push_unique(queries, Registry::Addgene, capture.as_str());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_genotype_feeds_both_gene_registries() {
        let queries = extract_queries(RecordType::Subject, &json!({"genotype": "Ai14"}));
        assert_eq!(queries[&Registry::Mgi], ["Ai14"]);
        assert_eq!(queries[&Registry::NcbiGene], ["Ai14"]);
    }

    #[test]
    fn composite_genotype_splits_on_semicolons() {
        let queries = extract_queries(
            RecordType::Subject,
            &json!({"genotype": "Ai14;Slc17a7-Cre"}),
        );
        assert_eq!(queries[&Registry::Mgi], ["Ai14", "Slc17a7-Cre"]);
        assert_eq!(queries[&Registry::NcbiGene], ["Ai14", "Slc17a7-Cre"]);
    }

    #[test]
    fn composite_genotype_splits_on_slash_and_times() {
        let queries = extract_queries(RecordType::Subject, &json!({"genotype": "Emx1-Cre/Ai94"}));
        assert!(queries[&Registry::Mgi].contains(&"Emx1-Cre".to_string()));
        assert!(queries[&Registry::Mgi].contains(&"Ai94".to_string()));

        let queries = extract_queries(
            RecordType::Subject,
            &json!({"genotype": "Slc17a7-Cre × Ai162"}),
        );
        assert!(queries[&Registry::Mgi].contains(&"Slc17a7-Cre".to_string()));
        assert!(queries[&Registry::Mgi].contains(&"Ai162".to_string()));
    }

    #[test]
    fn short_tokens_are_discarded() {
        let queries = extract_queries(RecordType::Subject, &json!({"genotype": "wt"}));
        assert!(queries.is_empty());

        let queries = extract_queries(RecordType::Subject, &json!({"genotype": "Ai14;wt"}));
        assert_eq!(queries[&Registry::Mgi], ["Ai14"]);
    }

    #[test]
    fn subject_without_genotype_yields_nothing() {
        let queries = extract_queries(
            RecordType::Subject,
            &json!({"subject_id": "123", "sex": "Male"}),
        );
        assert!(queries.is_empty());
    }

    #[test]
    fn alleles_feed_the_informatics_registry() {
        let queries = extract_queries(
            RecordType::Subject,
            &json!({"alleles": [{"name": "Ai14"}, {"name": "Slc17a7-Cre"}, "Ai94"]}),
        );
        assert_eq!(queries[&Registry::Mgi], ["Ai14", "Slc17a7-Cre", "Ai94"]);
        assert!(!queries.contains_key(&Registry::NcbiGene));
    }

    #[test]
    fn nested_plasmid_names_are_found() {
        let queries = extract_queries(
            RecordType::Procedures,
            &json!({
                "subject_procedures": [{
                    "injection_materials": [{"name": "pAAV-EF1a-DIO-hChR2-EYFP"}],
                }]
            }),
        );
        assert!(
            queries[&Registry::Addgene].contains(&"pAAV-EF1a-DIO-hChR2-EYFP".to_string())
        );
    }

    #[test]
    fn catalog_numbers_above_threshold_are_extracted() {
        let queries = extract_queries(
            RecordType::Procedures,
            &json!({"injection_materials": "pAAV-EF1a (Addgene 26973)"}),
        );
        assert!(queries[&Registry::Addgene].contains(&"26973".to_string()));
        assert!(queries[&Registry::Addgene].contains(&"pAAV-EF1a".to_string()));
    }

    #[test]
    fn small_numbers_are_not_catalog_numbers() {
        let queries = extract_queries(
            RecordType::Procedures,
            &json!({"notes": "sectioned at 1000 um"}),
        );
        assert!(queries.is_empty());
    }

    #[test]
    fn bare_serotypes_trigger_lookups() {
        for name in ["AAV11", "AAV9"] {
            let queries = extract_queries(
                RecordType::Procedures,
                &json!({"injection_materials": [{"name": name}]}),
            );
            assert!(
                queries[&Registry::Addgene].iter().any(|q| q.contains(name)),
                "expected {name} to be extracted"
            );
        }
    }

    #[test]
    fn procedures_without_materials_yield_nothing() {
        let queries = extract_queries(
            RecordType::Procedures,
            &json!({"procedure_type": "Craniotomy", "coordinates": {"x": 1.0, "y": 2.0}}),
        );
        assert!(queries.is_empty());
    }

    #[test]
    fn other_types_never_extract() {
        let queries = extract_queries(
            RecordType::Session,
            &json!({"session_start_time": "2025-01-01"}),
        );
        assert!(queries.is_empty());

        let queries = extract_queries(
            RecordType::DataDescription,
            &json!({"project_name": "pAAV study 26973"}),
        );
        assert!(queries.is_empty());
    }

    #[test]
    fn duplicates_collapse_preserving_first_seen_order() {
        let queries = extract_queries(
            RecordType::Procedures,
            &json!({
                "subject_procedures": [
                    {"injection_materials": [{"name": "pAAV-EF1a"}]},
                    {"injection_materials": [{"name": "pAAV-EF1a"}]},
                ]
            }),
        );
        let addgene = &queries[&Registry::Addgene];
        assert_eq!(addgene.iter().filter(|q| *q == "pAAV-EF1a").count(), 1);
    }
}
