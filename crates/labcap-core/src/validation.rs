//! # Validation Engine
//!
//! Pure per-type validation of record data against the schema config:
//! required fields, controlled vocabularies, format and range checks,
//! cross-field ordering, unknown-field detection.
//!
//! Validation never fails as an operation. Its output is a structured
//! `ValidationResult`; issues are values, not errors, and the engine has
//! no dependency on the store.

use crate::schema::SchemaConfig;
use crate::types::{
    RecordType, Severity, ValidationIssue, ValidationResult, ValidationStatus,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Subject identifiers in the downstream system are numeric strings of
/// at least four digits.
static SUBJECT_ID_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,}$").expect("static pattern"));

/// Timestamp formats accepted for session start/end, tried in order.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMATS: [&str; 3] = ["%H:%M %p", "%H:%M", "%I:%M %p"];

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Run all validation rules for one record.
///
/// Two passes: the required-field check (which alone drives the
/// completeness score), then the type-specific rule function, if the
/// type has one. Issues are retained in detection order.
#[must_use]
pub fn validate(record_type: RecordType, data: &Value, schema: &SchemaConfig) -> ValidationResult {
    let mut recorder = Recorder::default();

    check_required_fields(record_type, data, schema, &mut recorder);

    match record_type {
        RecordType::Subject => validate_subject(data, schema, &mut recorder),
        RecordType::DataDescription => validate_data_description(data, schema, &mut recorder),
        RecordType::Session => validate_session(data, &mut recorder),
        RecordType::Procedures => validate_procedures(data, &mut recorder),
        // No special rules; the required-field check alone still ran.
        RecordType::Instrument
        | RecordType::Rig
        | RecordType::Acquisition
        | RecordType::Processing
        | RecordType::QualityControl => {}
    }

    check_unknown_fields(record_type, data, schema, &mut recorder);

    recorder.finish(record_type, schema.required(record_type).len())
}

// =============================================================================
// RESULT RECORDER
// =============================================================================

/// Accumulates issues during one validation run.
#[derive(Debug, Default)]
struct Recorder {
    issues: Vec<ValidationIssue>,
    missing_required: Vec<String>,
    valid_fields: Vec<String>,
}

impl Recorder {
    fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    fn add_valid(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.valid_fields.contains(&field) {
            self.valid_fields.push(field);
        }
    }

    fn finish(self, record_type: RecordType, required_total: usize) -> ValidationResult {
        let has_errors = self.issues.iter().any(|i| i.severity == Severity::Error);
        let status = if has_errors {
            ValidationStatus::Errors
        } else if !self.issues.is_empty() || !self.missing_required.is_empty() {
            ValidationStatus::Warnings
        } else {
            ValidationStatus::Valid
        };

        let completeness_score = if required_total == 0 {
            1.0
        } else {
            let present = required_total - self.missing_required.len();
            ((present as f64 / required_total as f64) * 100.0).round() / 100.0
        };

        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .issues
            .into_iter()
            .partition(|i| i.severity == Severity::Error);

        ValidationResult {
            record_type,
            status,
            completeness_score,
            errors,
            warnings,
            missing_required: self.missing_required,
            valid_fields: self.valid_fields,
        }
    }
}

// =============================================================================
// FIELD RESOLUTION HELPERS
// =============================================================================

/// Resolve a dotted field path through nested maps.
fn get_nested<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Null, empty string, and empty sequence all count as absent.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Render a scalar the way it would appear in a message.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a value to a number: JSON numbers directly, strings by parsing.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a timestamp against the ordered accepted-format list.
///
/// Bare time-of-day values parse onto a fixed epoch date so two of them
/// still compare within the same day.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(trimmed, format) {
            return Some(epoch.and_time(time));
        }
    }
    None
}

// =============================================================================
// PASS 1: REQUIRED FIELDS
// =============================================================================

fn check_required_fields(
    record_type: RecordType,
    data: &Value,
    schema: &SchemaConfig,
    recorder: &mut Recorder,
) {
    for path in schema.required(record_type) {
        match get_nested(data, path) {
            Some(value) if !is_absent(value) => recorder.add_valid(path.clone()),
            _ => recorder.missing_required.push(path.clone()),
        }
    }
}

// =============================================================================
// PASS 2: TYPE-SPECIFIC RULES
// =============================================================================

fn validate_subject(data: &Value, schema: &SchemaConfig, recorder: &mut Recorder) {
    if let Some(subject_id) = data.get("subject_id").filter(|v| !v.is_null()) {
        let rendered = display_value(subject_id);
        if SUBJECT_ID_FORMAT.is_match(&rendered) {
            recorder.add_valid("subject_id");
        } else {
            recorder.add_warning(
                "subject_id",
                format!("Subject ID '{rendered}' should be a numeric string with 4+ digits"),
            );
        }
    }

    if let Some(sex) = data.get("sex").filter(|v| !v.is_null()) {
        let rendered = display_value(sex);
        if schema.is_valid_sex(&rendered) {
            recorder.add_valid("sex");
        } else {
            let allowed: Vec<&str> = schema.sex_values().collect();
            recorder.add_error(
                "sex",
                format!("Invalid sex '{rendered}'. Must be one of: {}", allowed.join(", ")),
            );
        }
    }

    if let Some(name) = data
        .get("species")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
    {
        if schema.is_known_species(name) {
            recorder.add_valid("species.name");
        } else {
            let expected: Vec<&str> = schema.species().collect();
            recorder.add_warning(
                "species.name",
                format!(
                    "Unrecognized species '{name}'. Expected one of: {}",
                    expected.join(", ")
                ),
            );
        }
    }
}

fn validate_data_description(data: &Value, schema: &SchemaConfig, recorder: &mut Recorder) {
    if let Some(modality) = data.get("modality").and_then(Value::as_array) {
        for (index, entry) in modality.iter().enumerate() {
            let Some(abbreviation) = entry.get("abbreviation").and_then(Value::as_str) else {
                continue;
            };
            let field = format!("modality[{index}].abbreviation");
            if schema.is_valid_modality(abbreviation) {
                recorder.add_valid(field);
            } else {
                let allowed: Vec<&str> = schema.modalities().collect();
                recorder.add_error(
                    field,
                    format!(
                        "Invalid modality '{abbreviation}'. Must be one of: {}",
                        allowed.join(", ")
                    ),
                );
            }
        }
    }

    if let Some(project_name) = data.get("project_name").and_then(Value::as_str) {
        if project_name.trim().len() < 2 {
            recorder.add_warning("project_name", "Project name is too short");
        } else {
            recorder.add_valid("project_name");
        }
    }
}

fn validate_session(data: &Value, recorder: &mut Recorder) {
    let start = data.get("session_start_time").filter(|v| !is_absent(v));
    let end = data.get("session_end_time").filter(|v| !is_absent(v));

    if start.is_some() {
        recorder.add_valid("session_start_time");
    }
    if end.is_some() {
        recorder.add_valid("session_end_time");
    }

    // End must come strictly after start, but only when both timestamps
    // parse; format validity is not itself checked here.
    if let (Some(start), Some(end)) = (start, end)
        && let Some(start_dt) = parse_timestamp(&display_value(start))
        && let Some(end_dt) = parse_timestamp(&display_value(end))
        && end_dt <= start_dt
    {
        recorder.add_error(
            "session_end_time",
            "Session end time must be after start time",
        );
    }

    if data.get("rig_id").is_some_and(|v| !v.is_null()) {
        recorder.add_valid("rig_id");
    }
}

fn validate_procedures(data: &Value, recorder: &mut Recorder) {
    if data.get("protocol_id").is_some_and(|v| !v.is_null()) {
        recorder.add_valid("protocol_id");
    }

    if let Some(coords) = data.get("coordinates").and_then(Value::as_object)
        && let (Some(x), Some(y)) = (coords.get("x"), coords.get("y"))
    {
        if coerce_number(x).is_some() && coerce_number(y).is_some() {
            recorder.add_valid("coordinates");
        } else {
            recorder.add_error(
                "coordinates",
                format!(
                    "Coordinates must be numeric, got x={}, y={}",
                    display_value(x),
                    display_value(y)
                ),
            );
        }
    }

    if let Some(thickness) = data.get("section_thickness_um").filter(|v| !v.is_null()) {
        match coerce_number(thickness) {
            Some(value) if value > 0.0 => recorder.add_valid("section_thickness_um"),
            Some(_) => recorder.add_error(
                "section_thickness_um",
                "Section thickness must be positive",
            ),
            None => recorder.add_error(
                "section_thickness_um",
                format!(
                    "Section thickness must be numeric, got '{}'",
                    display_value(thickness)
                ),
            ),
        }
    }
}

// =============================================================================
// PASS 3: UNKNOWN FIELDS
// =============================================================================

/// Warn about top-level keys outside the type's allowlist. Skipped
/// entirely when the schema provides no allowlist for the type.
fn check_unknown_fields(
    record_type: RecordType,
    data: &Value,
    schema: &SchemaConfig,
    recorder: &mut Recorder,
) {
    let Some(allowlist) = schema.known_fields(record_type) else {
        return;
    };
    let Some(object) = data.as_object() else {
        return;
    };
    for key in object.keys() {
        if !allowlist.contains(key) {
            recorder.add_warning(
                key.clone(),
                format!("Unknown field '{key}' for {record_type} records"),
            );
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

    fn run(record_type: RecordType, data: Value) -> ValidationResult {
        validate(record_type, &data, &SchemaConfig::default())
    }

    // -------------------------------------------------------------------------
    // Required fields & completeness
    // -------------------------------------------------------------------------

    #[test]
    fn subject_with_id_is_complete() {
        let result = run(RecordType::Subject, json!({"subject_id": "553429"}));
        assert!(result.missing_required.is_empty());
        assert!((result.completeness_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.status, ValidationStatus::Valid);
        assert!(result.valid_fields.contains(&"subject_id".to_string()));
    }

    #[test]
    fn empty_subject_is_missing_its_id() {
        let result = run(RecordType::Subject, json!({}));
        assert_eq!(result.missing_required, vec!["subject_id"]);
        assert!(result.completeness_score.abs() < f64::EPSILON);
        assert_eq!(result.status, ValidationStatus::Warnings);
    }

    #[test]
    fn data_description_requires_modality_and_project() {
        let result = run(RecordType::DataDescription, json!({}));
        assert_eq!(result.missing_required, vec!["modality", "project_name"]);
        assert!(result.completeness_score.abs() < f64::EPSILON);

        let result = run(
            RecordType::DataDescription,
            json!({
                "modality": [{"name": "Planar optical physiology", "abbreviation": "pophys"}],
                "project_name": "BrainMap",
            }),
        );
        assert!(result.missing_required.is_empty());
        assert!((result.completeness_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn half_present_required_fields_score_half() {
        let result = run(
            RecordType::DataDescription,
            json!({"project_name": "BrainMap"}),
        );
        assert_eq!(result.missing_required, vec!["modality"]);
        assert!((result.completeness_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn types_without_required_fields_score_full() {
        let result = run(RecordType::Procedures, json!({}));
        assert!(result.missing_required.is_empty());
        assert!((result.completeness_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_values_count_as_absent() {
        for value in [json!(null), json!(""), json!([])] {
            let result = run(RecordType::Subject, json!({"subject_id": value.clone()}));
            assert_eq!(result.missing_required, vec!["subject_id"], "for {value:?}");
        }
    }

    // -------------------------------------------------------------------------
    // Identifier format
    // -------------------------------------------------------------------------

    #[test]
    fn short_subject_id_warns_but_counts_present() {
        let result = run(RecordType::Subject, json!({"subject_id": "12"}));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "subject_id");
        assert!(result.warnings[0].message.contains("'12'"));
        assert!(result.errors.is_empty());
        assert!(result.missing_required.is_empty());
        assert!((result.completeness_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn long_numeric_subject_id_is_clean() {
        let result = run(RecordType::Subject, json!({"subject_id": "553429"}));
        assert!(result.warnings.is_empty());
        assert!(result.errors.is_empty());
    }

    // -------------------------------------------------------------------------
    // Enum membership
    // -------------------------------------------------------------------------

    #[test]
    fn valid_sex_values_pass() {
        for sex in ["Male", "Female"] {
            let result = run(RecordType::Subject, json!({"sex": sex}));
            assert!(
                result.errors.iter().all(|i| i.field != "sex"),
                "'{sex}' should be valid"
            );
        }
    }

    #[test]
    fn sex_outside_vocabulary_is_an_error() {
        for sex in ["Unknown", "unknown_value"] {
            let result = run(RecordType::Subject, json!({"sex": sex}));
            let sex_errors: Vec<_> = result.errors.iter().filter(|i| i.field == "sex").collect();
            assert_eq!(sex_errors.len(), 1, "'{sex}' should error");
            assert_eq!(result.status, ValidationStatus::Errors);
        }
    }

    #[test]
    fn invalid_modality_is_an_error() {
        let result = run(
            RecordType::DataDescription,
            json!({"modality": [{"abbreviation": "xray"}], "project_name": "Test"}),
        );
        let modality_errors: Vec<_> = result
            .errors
            .iter()
            .filter(|i| i.field.contains("modality"))
            .collect();
        assert_eq!(modality_errors.len(), 1);
        assert_eq!(modality_errors[0].field, "modality[0].abbreviation");
        assert_eq!(result.status, ValidationStatus::Errors);
    }

    #[test]
    fn stale_modality_slap_is_an_error() {
        let result = run(
            RecordType::DataDescription,
            json!({"modality": [{"abbreviation": "slap"}]}),
        );
        let modality_errors: Vec<_> = result
            .errors
            .iter()
            .filter(|i| i.field.contains("modality"))
            .collect();
        assert_eq!(modality_errors.len(), 1);
        assert!(modality_errors[0].message.contains("slap"));
    }

    #[test]
    fn valid_modalities_pass() {
        for abbr in ["ecephys", "pophys", "SPIM", "behavior", "slap2"] {
            let result = run(
                RecordType::DataDescription,
                json!({"modality": [{"abbreviation": abbr}]}),
            );
            assert!(
                result.errors.iter().all(|i| !i.field.contains("modality")),
                "'{abbr}' should be valid"
            );
        }
    }

    #[test]
    fn mixed_modalities_flag_only_the_bad_index() {
        let result = run(
            RecordType::DataDescription,
            json!({"modality": [{"abbreviation": "ecephys"}, {"abbreviation": "xray"}]}),
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "modality[1].abbreviation");
        assert!(
            result
                .valid_fields
                .contains(&"modality[0].abbreviation".to_string())
        );
    }

    // -------------------------------------------------------------------------
    // Referential plausibility
    // -------------------------------------------------------------------------

    #[test]
    fn known_species_is_clean() {
        let result = run(
            RecordType::Subject,
            json!({"species": {"name": "Mus musculus"}}),
        );
        assert!(result.warnings.iter().all(|i| !i.field.contains("species")));
    }

    #[test]
    fn unknown_species_warns_only() {
        let result = run(
            RecordType::Subject,
            json!({"species": {"name": "Canis lupus"}}),
        );
        let species_warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|i| i.field.contains("species"))
            .collect();
        assert_eq!(species_warnings.len(), 1);
        assert!(result.errors.is_empty());
    }

    // -------------------------------------------------------------------------
    // Cross-field ordering
    // -------------------------------------------------------------------------

    #[test]
    fn end_after_start_is_clean() {
        let result = run(
            RecordType::Session,
            json!({
                "session_start_time": "2025-01-15T09:00:00",
                "session_end_time": "2025-01-15T17:30:00",
            }),
        );
        assert!(result.errors.is_empty());
        assert!(result.valid_fields.contains(&"session_start_time".to_string()));
        assert!(result.valid_fields.contains(&"session_end_time".to_string()));
    }

    #[test]
    fn end_before_start_is_an_error() {
        let result = run(
            RecordType::Session,
            json!({
                "session_start_time": "2025-01-15T17:30:00",
                "session_end_time": "2025-01-15T09:00:00",
            }),
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "session_end_time");
    }

    #[test]
    fn fractional_seconds_parse() {
        let result = run(
            RecordType::Session,
            json!({
                "session_start_time": "2025-01-15T09:00:00.500",
                "session_end_time": "2025-01-15T09:00:00.250",
            }),
        );
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn bare_times_compare_within_a_day() {
        let result = run(
            RecordType::Session,
            json!({"session_start_time": "09:00", "session_end_time": "5:30 PM"}),
        );
        assert!(result.errors.is_empty());

        let result = run(
            RecordType::Session,
            json!({"session_start_time": "17:30", "session_end_time": "09:00"}),
        );
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn unparseable_timestamps_skip_the_ordering_check() {
        let result = run(
            RecordType::Session,
            json!({
                "session_start_time": "next tuesday",
                "session_end_time": "after lunch",
            }),
        );
        assert!(result.errors.is_empty());
    }

    // -------------------------------------------------------------------------
    // Numeric bounds
    // -------------------------------------------------------------------------

    #[test]
    fn numeric_coordinates_are_valid() {
        let result = run(
            RecordType::Procedures,
            json!({"coordinates": {"x": 20.0, "y": 50.0}}),
        );
        assert!(result.valid_fields.contains(&"coordinates".to_string()));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn string_coordinates_coerce() {
        let result = run(
            RecordType::Procedures,
            json!({"coordinates": {"x": "-1.5", "y": "2.0"}}),
        );
        assert!(result.valid_fields.contains(&"coordinates".to_string()));
    }

    #[test]
    fn non_numeric_coordinates_error() {
        let result = run(
            RecordType::Procedures,
            json!({"coordinates": {"x": "left", "y": 2.0}}),
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "coordinates");
    }

    #[test]
    fn positive_thickness_is_valid() {
        let result = run(RecordType::Procedures, json!({"section_thickness_um": 10.0}));
        assert!(
            result
                .valid_fields
                .contains(&"section_thickness_um".to_string())
        );
    }

    #[test]
    fn negative_thickness_errors() {
        let result = run(RecordType::Procedures, json!({"section_thickness_um": -5.0}));
        let errors: Vec<_> = result
            .errors
            .iter()
            .filter(|i| i.field == "section_thickness_um")
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn non_numeric_thickness_errors() {
        let result = run(
            RecordType::Procedures,
            json!({"section_thickness_um": "thin"}),
        );
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("'thin'"));
    }

    // -------------------------------------------------------------------------
    // Unknown fields
    // -------------------------------------------------------------------------

    #[test]
    fn unknown_field_warns_and_names_the_field() {
        let result = run(
            RecordType::Subject,
            json!({"subject_id": "12345", "bogus_field": "x"}),
        );
        let warnings: Vec<_> = result
            .warnings
            .iter()
            .filter(|i| i.message.contains("bogus_field"))
            .collect();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn known_fields_do_not_warn() {
        let result = run(
            RecordType::Subject,
            json!({"subject_id": "12345", "sex": "Male"}),
        );
        assert!(
            result
                .warnings
                .iter()
                .all(|i| !i.message.to_lowercase().contains("unknown field"))
        );
    }

    #[test]
    fn app_specific_session_fields_are_known() {
        let result = run(
            RecordType::Session,
            json!({"session_start_time": "2025-01-15T09:00:00", "rig_id": "rig-001"}),
        );
        assert!(
            result
                .warnings
                .iter()
                .all(|i| !i.message.to_lowercase().contains("unknown field"))
        );
    }

    #[test]
    fn unknown_fields_flagged_on_every_type() {
        for record_type in RecordType::ALL {
            let result = run(record_type, json!({"totally_bogus_xyz": "x"}));
            let warnings: Vec<_> = result
                .warnings
                .iter()
                .filter(|i| i.message.contains("totally_bogus_xyz"))
                .collect();
            assert_eq!(warnings.len(), 1, "expected warning for {record_type}");
        }
    }

    #[test]
    fn missing_allowlist_disables_only_unknown_field_check() {
        let schema = SchemaConfig::default().without_known_fields(RecordType::Subject);
        let result = validate(
            RecordType::Subject,
            &json!({"subject_id": "12", "mystery": 1}),
            &schema,
        );
        assert!(
            result
                .warnings
                .iter()
                .all(|i| !i.message.contains("mystery"))
        );
        // The rest of validation still runs.
        assert!(result.warnings.iter().any(|i| i.field == "subject_id"));
    }

    // -------------------------------------------------------------------------
    // Result shape
    // -------------------------------------------------------------------------

    #[test]
    fn status_derivation() {
        assert_eq!(
            run(RecordType::Subject, json!({"subject_id": "553429"})).status,
            ValidationStatus::Valid
        );
        assert_eq!(
            run(RecordType::Subject, json!({"subject_id": "12"})).status,
            ValidationStatus::Warnings
        );
        assert_eq!(
            run(RecordType::Subject, json!({"sex": "invalid"})).status,
            ValidationStatus::Errors
        );
    }

    #[test]
    fn complete_record_can_still_carry_errors() {
        let result = run(
            RecordType::DataDescription,
            json!({"modality": [{"abbreviation": "xray"}], "project_name": "Test"}),
        );
        assert!((result.completeness_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.status, ValidationStatus::Errors);
    }

    #[test]
    fn serialized_result_has_the_contract_shape() {
        let result = run(
            RecordType::Subject,
            json!({"subject_id": "553429", "sex": "invalid"}),
        );
        let value = serde_json::to_value(&result).expect("serialize");
        for key in [
            "record_type",
            "status",
            "completeness_score",
            "errors",
            "warnings",
            "missing_required",
            "valid_fields",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["status"], "errors");
        assert_eq!(value["errors"][0]["severity"], "error");
    }

    #[test]
    fn issues_on_the_same_field_are_all_retained_in_order() {
        // Short subject_id (format warning) plus unknown-field warning on
        // another key; both survive, in detection order.
        let result = run(
            RecordType::Subject,
            json!({"subject_id": "12", "bogus_field": "x"}),
        );
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].field, "subject_id");
        assert_eq!(result.warnings[1].field, "bogus_field");
    }
}
