//! # Schema Configuration
//!
//! Controlled vocabularies and per-type field tables for the validation
//! engine.
//!
//! Vocabularies are configuration, not code: the defaults here track the
//! current upstream schema release, and deployments override them with a
//! TOML document (`SchemaConfig::from_toml_str`). The engine makes no
//! attempt to stay complete against any particular vocabulary release.

use crate::types::{CaptureError, RecordType};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DEFAULT VOCABULARIES
// =============================================================================

/// Modality abbreviations accepted by the downstream system of record.
/// Note `slap` was renamed to `slap2` upstream and is no longer valid.
const DEFAULT_MODALITIES: [&str; 20] = [
    "BARseq",
    "EM",
    "EMG",
    "ISI",
    "MAPseq",
    "MRI",
    "SPIM",
    "STPT",
    "behavior",
    "behavior-videos",
    "brightfield",
    "confocal",
    "ecephys",
    "fMOST",
    "fib",
    "icephys",
    "merfish",
    "pophys",
    "scRNAseq",
    "slap2",
];

/// Sex values accepted by the downstream system of record.
const DEFAULT_SEX: [&str; 2] = ["Male", "Female"];

/// Species names recognized today. This list is expected to grow, which
/// is why species checks warn instead of erroring.
const DEFAULT_SPECIES: [&str; 6] = [
    "Danio rerio",
    "Drosophila melanogaster",
    "Homo sapiens",
    "Macaca mulatta",
    "Mus musculus",
    "Rattus norvegicus",
];

// =============================================================================
// SCHEMA CONFIG
// =============================================================================

/// The controlled-vocabulary provider consumed by the validation engine.
///
/// `known_fields` is optional per type: a type without an allowlist
/// simply skips the unknown-field warning, everything else still runs.
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    required_fields: BTreeMap<RecordType, Vec<String>>,
    known_fields: BTreeMap<RecordType, BTreeSet<String>>,
    modalities: BTreeSet<String>,
    sex_values: BTreeSet<String>,
    species: BTreeSet<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let mut required_fields = BTreeMap::new();
        required_fields.insert(RecordType::Subject, vec!["subject_id".to_string()]);
        required_fields.insert(
            RecordType::DataDescription,
            vec!["modality".to_string(), "project_name".to_string()],
        );

        let mut known_fields = BTreeMap::new();
        known_fields.insert(
            RecordType::Subject,
            to_set(&[
                "subject_id",
                "species",
                "sex",
                "genotype",
                "alleles",
                "date_of_birth",
                "breeding_info",
                "background_strain",
                "source",
                "housing",
                "wellness_reports",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Procedures,
            to_set(&[
                "subject_id",
                "subject_procedures",
                "specimen_procedures",
                "procedure_type",
                "protocol_id",
                "coordinates",
                "section_thickness_um",
                "injection_materials",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::DataDescription,
            to_set(&[
                "modality",
                "project_name",
                "subject_id",
                "creation_time",
                "institution",
                "investigators",
                "funding_source",
                "data_level",
                "tags",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Instrument,
            to_set(&[
                "instrument_id",
                "name",
                "instrument_type",
                "manufacturer",
                "modification_date",
                "components",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Rig,
            to_set(&[
                "rig_id",
                "name",
                "modification_date",
                "modalities",
                "components",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Session,
            to_set(&[
                "session_start_time",
                "session_end_time",
                "session_type",
                "rig_id",
                "subject_id",
                "experimenters",
                "iacuc_protocol",
                "data_streams",
                "stimulus_epochs",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Acquisition,
            to_set(&[
                "acquisition_start_time",
                "acquisition_end_time",
                "instrument_id",
                "subject_id",
                "experimenters",
                "data_streams",
                "stimulus_epochs",
                "notes",
            ]),
        );
        known_fields.insert(
            RecordType::Processing,
            to_set(&["processing_pipeline", "analyses", "notes"]),
        );
        known_fields.insert(
            RecordType::QualityControl,
            to_set(&["evaluations", "status", "notes"]),
        );

        Self {
            required_fields,
            known_fields,
            modalities: to_set(&DEFAULT_MODALITIES),
            sex_values: to_set(&DEFAULT_SEX),
            species: to_set(&DEFAULT_SPECIES),
        }
    }
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl SchemaConfig {
    /// Required dotted field paths for a record type. Empty for types
    /// with no required fields (their completeness score is 1.0).
    #[must_use]
    pub fn required(&self, record_type: RecordType) -> &[String] {
        self.required_fields
            .get(&record_type)
            .map_or(&[], Vec::as_slice)
    }

    /// Known-field allowlist for a record type, if one is configured.
    #[must_use]
    pub fn known_fields(&self, record_type: RecordType) -> Option<&BTreeSet<String>> {
        self.known_fields.get(&record_type)
    }

    /// Whether a modality abbreviation is in the controlled vocabulary.
    #[must_use]
    pub fn is_valid_modality(&self, abbreviation: &str) -> bool {
        self.modalities.contains(abbreviation)
    }

    /// Whether a sex value is in the controlled vocabulary.
    #[must_use]
    pub fn is_valid_sex(&self, sex: &str) -> bool {
        self.sex_values.contains(sex)
    }

    /// Whether a species name is recognized.
    #[must_use]
    pub fn is_known_species(&self, name: &str) -> bool {
        self.species.contains(name)
    }

    /// Sorted modality vocabulary, for error messages.
    #[must_use]
    pub fn modalities(&self) -> impl Iterator<Item = &str> {
        self.modalities.iter().map(String::as_str)
    }

    /// Sorted sex vocabulary, for error messages.
    #[must_use]
    pub fn sex_values(&self) -> impl Iterator<Item = &str> {
        self.sex_values.iter().map(String::as_str)
    }

    /// Sorted species vocabulary, for warning messages.
    #[must_use]
    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(String::as_str)
    }

    /// Drop the known-field allowlist for a record type.
    ///
    /// Without an allowlist the unknown-field warning is skipped for that
    /// type; every other check still runs.
    #[must_use]
    pub fn without_known_fields(mut self, record_type: RecordType) -> Self {
        self.known_fields.remove(&record_type);
        self
    }

    /// Load a schema config from a TOML document, overriding defaults.
    ///
    /// Sections are optional; whatever is absent keeps its default. An
    /// unrecognized record type key is rejected as `InvalidType`.
    ///
    /// ```toml
    /// [vocabularies]
    /// modalities = ["ecephys", "pophys"]
    /// sex = ["Male", "Female"]
    ///
    /// [required_fields]
    /// subject = ["subject_id"]
    ///
    /// [known_fields]
    /// subject = ["subject_id", "sex", "genotype"]
    /// ```
    pub fn from_toml_str(document: &str) -> Result<Self, CaptureError> {
        let overrides: SchemaOverrides = toml::from_str(document)
            .map_err(|e| CaptureError::Serialization(format!("schema config: {e}")))?;

        let mut config = Self::default();

        if let Some(vocab) = overrides.vocabularies {
            if let Some(modalities) = vocab.modalities {
                config.modalities = modalities.into_iter().collect();
            }
            if let Some(sex) = vocab.sex {
                config.sex_values = sex.into_iter().collect();
            }
            if let Some(species) = vocab.species {
                config.species = species.into_iter().collect();
            }
        }

        if let Some(required) = overrides.required_fields {
            for (type_name, paths) in required {
                let record_type = RecordType::parse(&type_name)?;
                config.required_fields.insert(record_type, paths);
            }
        }

        if let Some(known) = overrides.known_fields {
            for (type_name, fields) in known {
                let record_type = RecordType::parse(&type_name)?;
                config
                    .known_fields
                    .insert(record_type, fields.into_iter().collect());
            }
        }

        Ok(config)
    }
}

// =============================================================================
// TOML OVERRIDE DOCUMENT
// =============================================================================

#[derive(Debug, Deserialize)]
struct SchemaOverrides {
    vocabularies: Option<VocabularyOverrides>,
    required_fields: Option<BTreeMap<String, Vec<String>>>,
    known_fields: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct VocabularyOverrides {
    modalities: Option<Vec<String>>,
    sex: Option<Vec<String>>,
    species: Option<Vec<String>>,
}

// =============================================================================
// TESTS
// =============================================================================
