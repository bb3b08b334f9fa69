//! # Registry Backends
//!
//! Concrete HTTP implementations of the core's `RegistryBackend` trait:
//! the Addgene plasmid catalog, the NCBI Gene database (E-utilities),
//! and the MGI allele informatics quicksearch.
//!
//! Transport failures are reported as soft outcomes (`LookupOutcome::
//! failure`) so they surface in summaries; the core's deadlines decide
//! when a call is abandoned outright.

use async_trait::async_trait;
use labcap_core::{
    LookupError, LookupOutcome, Registry, RegistryBackend, RegistryEntry, RegistryProvider,
};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

/// Cap on parsed entries per Addgene search.
const MAX_ADDGENE_RESULTS: usize = 5;

/// Result links on the Addgene search page, markdown style:
/// `[pAAV2/11](/240486/)`.
static MD_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(/(\d{4,6})/?\)").expect("static pattern"));

/// Result links, HTML style: `<a href="/240486/">pAAV2/11</a>`.
static HTML_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]+href="/(\d{4,6})/?"[^>]*>\s*([^<]+?)\s*</a>"#).expect("static pattern")
});

/// Catalog number followed (possibly across lines) by a purpose or
/// description blurb, markdown style.
static MD_PURPOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#(\d{4,6})[\s\S]*?(?:Purpose|Description)\s*\n\s*([^\n]{5,200})")
        .expect("static pattern")
});

/// Purpose blurb, HTML style.
static HTML_PURPOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)>\s*#(\d{4,6})\s*<.*?(?:Purpose|purpose).*?>\s*([^<]{5,200})")
        .expect("static pattern")
});

/// Leftover markup inside scraped description text.
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));

fn transport_failure(context: &str, error: &reqwest::Error) -> LookupOutcome {
    LookupOutcome::failure(format!("{context}: {error}"))
}

// =============================================================================
// PROVIDER CONSTRUCTION
// =============================================================================

/// Build the default provider with all three registry backends.
pub fn default_provider() -> RegistryProvider {
    let http = reqwest::Client::new();
    RegistryProvider::new()
        .with_backend(Registry::Addgene, Arc::new(AddgeneBackend::new(http.clone())))
        .with_backend(Registry::NcbiGene, Arc::new(NcbiGeneBackend::new(http.clone())))
        .with_backend(Registry::Mgi, Arc::new(MgiBackend::new(http)))
}

// =============================================================================
// ADDGENE
// =============================================================================

/// Plasmid/vector catalog lookups against addgene.org.
pub struct AddgeneBackend {
    http: reqwest::Client,
}

impl AddgeneBackend {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Extract plasmid entries from an Addgene search page (HTML or the
/// markdown-ish text some mirrors serve), deduped by catalog number.
fn parse_addgene_results(text: &str, max_results: usize) -> Vec<RegistryEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut names: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();
    let mut descriptions: std::collections::BTreeMap<String, String> =
        std::collections::BTreeMap::new();

    for capture in MD_RESULT.captures_iter(text) {
        let name = capture[1].trim().to_string();
        let catalog = capture[2].to_string();
        if !names.contains_key(&catalog) {
            order.push(catalog.clone());
            names.insert(catalog, name);
        }
    }

    if order.is_empty() {
        for capture in HTML_LINK.captures_iter(text) {
            let catalog = capture[1].to_string();
            let name = capture[2].trim().to_string();
            if !names.contains_key(&catalog) && !name.is_empty() && !name.starts_with('#') {
                order.push(catalog.clone());
                names.insert(catalog, name);
            }
        }
    }

    for pattern in [&*MD_PURPOSE, &*HTML_PURPOSE] {
        for capture in pattern.captures_iter(text) {
            let catalog = capture[1].to_string();
            if names.contains_key(&catalog) && !descriptions.contains_key(&catalog) {
                let cleaned = TAG.replace_all(capture[2].trim(), "").trim().to_string();
                descriptions.insert(catalog, cleaned);
            }
        }
    }

    order
        .into_iter()
        .take(max_results)
        .map(|catalog| RegistryEntry::Plasmid {
            url: format!("https://www.addgene.org/{catalog}/"),
            name: names.remove(&catalog).unwrap_or_default(),
            description: descriptions.remove(&catalog).unwrap_or_default(),
            catalog_number: catalog,
        })
        .collect()
}

#[async_trait]
impl RegistryBackend for AddgeneBackend {
    async fn lookup(&self, query: &str) -> Result<LookupOutcome, LookupError> {
        let trimmed = query.trim();

        // Numeric queries probe the catalog page directly.
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            let url = format!("https://www.addgene.org/{trimmed}/");
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let url = response.url().to_string();
                    return Ok(LookupOutcome::found(vec![RegistryEntry::Plasmid {
                        catalog_number: trimmed.to_string(),
                        name: String::new(),
                        description: String::new(),
                        url,
                    }]));
                }
                Ok(_) | Err(_) => {
                    // Fall through to the search page.
                }
            }
        }

        let response = match self
            .http
            .get("https://www.addgene.org/search/catalog/plasmids/")
            .query(&[("q", trimmed)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return Ok(transport_failure("addgene search", &error)),
        };
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => return Ok(transport_failure("addgene body", &error)),
        };

        let plasmids = parse_addgene_results(&text, MAX_ADDGENE_RESULTS);
        if plasmids.is_empty() {
            Ok(LookupOutcome::not_found())
        } else {
            Ok(LookupOutcome::found(plasmids))
        }
    }
}

// =============================================================================
// NCBI GENE
// =============================================================================

/// Gene lookups through the NCBI E-utilities JSON API.
pub struct NcbiGeneBackend {
    http: reqwest::Client,
}

impl NcbiGeneBackend {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[async_trait]
impl RegistryBackend for NcbiGeneBackend {
    async fn lookup(&self, query: &str) -> Result<LookupOutcome, LookupError> {
        let search: Value = match self
            .http
            .get(format!("{EUTILS_BASE}/esearch.fcgi"))
            .query(&[("db", "gene"), ("term", query), ("retmode", "json"), ("retmax", "5")])
            .send()
            .await
        {
            Ok(response) => match response.json().await {
                Ok(json) => json,
                Err(error) => return Ok(transport_failure("ncbi esearch decode", &error)),
            },
            Err(error) => return Ok(transport_failure("ncbi esearch", &error)),
        };

        let id_list: Vec<String> = search["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if id_list.is_empty() {
            return Ok(LookupOutcome::not_found());
        }

        let summary: Value = match self
            .http
            .get(format!("{EUTILS_BASE}/esummary.fcgi"))
            .query(&[
                ("db", "gene"),
                ("id", id_list.join(",").as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await
        {
            Ok(response) => match response.json().await {
                Ok(json) => json,
                Err(error) => return Ok(transport_failure("ncbi esummary decode", &error)),
            },
            Err(error) => return Ok(transport_failure("ncbi esummary", &error)),
        };

        let results = id_list
            .into_iter()
            .map(|gene_id| {
                let info = &summary["result"][&gene_id];
                RegistryEntry::Gene {
                    symbol: info["name"].as_str().unwrap_or_default().to_string(),
                    description: info["description"].as_str().unwrap_or_default().to_string(),
                    organism: info["organism"]["scientificname"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    url: format!("https://www.ncbi.nlm.nih.gov/gene/{gene_id}"),
                    gene_id,
                }
            })
            .collect();

        Ok(LookupOutcome::found(results))
    }
}

// =============================================================================
// MGI
// =============================================================================

/// Mouse gene/allele probes against the MGI quicksearch.
pub struct MgiBackend {
    http: reqwest::Client,
}

impl MgiBackend {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RegistryBackend for MgiBackend {
    async fn lookup(&self, query: &str) -> Result<LookupOutcome, LookupError> {
        let response = match self
            .http
            .get("https://www.informatics.jax.org/quicksearch/summary")
            .query(&[("queryType", "exactPhrase"), ("query", query)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => return Ok(transport_failure("mgi quicksearch", &error)),
        };

        if response.status().is_success() {
            Ok(LookupOutcome::found(vec![RegistryEntry::Reference {
                url: response.url().to_string(),
            }]))
        } else {
            Ok(LookupOutcome::not_found())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
