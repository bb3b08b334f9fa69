//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::registries;
use labcap_core::{
    Catalog, CaptureError, CaptureRequest, Category, RecordFilter, RecordId, RecordType,
    RegistryProvider, SchemaConfig, capture, format_validation_summary,
};
use std::path::Path;

/// Maximum size of a capture data file (2 MB, matching the API body limit).
const MAX_CAPTURE_FILE_SIZE: u64 = 2 * 1024 * 1024;

// =============================================================================
// SHARED SETUP
// =============================================================================

/// Open the catalog for the selected backend.
fn load_catalog(db_path: &Path, backend: &str) -> Result<Catalog, CaptureError> {
    match backend {
        "memory" => Ok(Catalog::new()),
        "redb" => Catalog::with_redb(db_path),
        other => Err(CaptureError::Storage(format!(
            "Unknown backend '{other}' (expected 'memory' or 'redb')"
        ))),
    }
}

/// Load the schema config, with TOML overrides when a path is given.
fn load_schema(path: Option<&Path>) -> Result<SchemaConfig, CaptureError> {
    match path {
        None => Ok(SchemaConfig::default()),
        Some(path) => {
            let document = std::fs::read_to_string(path).map_err(|e| {
                CaptureError::Storage(format!("Cannot read schema file '{}': {e}", path.display()))
            })?;
            SchemaConfig::from_toml_str(&document)
        }
    }
}

fn render<T: serde::Serialize>(value: &T) -> Result<String, CaptureError> {
    serde_json::to_string_pretty(value).map_err(|e| CaptureError::Serialization(e.to_string()))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    schema_path: Option<&Path>,
    host: &str,
    port: u16,
) -> Result<(), CaptureError> {
    let catalog = load_catalog(db_path, backend)?;
    let schema = load_schema(schema_path)?;
    let provider = registries::default_provider();

    println!("Labcap Metadata Capture Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  POST /capture  - Capture a metadata record");
    println!("  GET  /records  - Search records");
    println!("  POST /links    - Link two records");
    println!("  GET  /sessions - List capture sessions");
    println!("  GET  /health   - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    let state = AppState::new(catalog, schema, provider);
    api::run_server(&addr, state).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show catalog status.
pub fn cmd_status(db_path: &Path, backend: &str, json_mode: bool) -> Result<(), CaptureError> {
    let catalog = load_catalog(db_path, backend)?;
    let stats = catalog.stats()?;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "records": stats.record_count,
            "links": stats.link_count,
            "sessions": stats.session_count,
        });
        println!("{}", render(&output)?);
    } else {
        println!("Catalog status ({backend})");
        println!("  Records:  {}", stats.record_count);
        println!("  Links:    {}", stats.link_count);
        println!("  Sessions: {}", stats.session_count);
    }
    Ok(())
}

// =============================================================================
// FIND COMMAND
// =============================================================================

/// Search records.
pub fn cmd_find(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    record_type: Option<&str>,
    category: Option<&str>,
    query: Option<String>,
) -> Result<(), CaptureError> {
    let catalog = load_catalog(db_path, backend)?;
    let filter = RecordFilter {
        record_type: record_type.map(RecordType::parse).transpose()?,
        category: category.map(Category::parse).transpose()?,
        status: None,
        query,
    };
    let records = catalog.find(&filter)?;

    if json_mode {
        println!("{}", render(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching records.");
        return Ok(());
    }
    println!("{} record(s):", records.len());
    for record in &records {
        println!(
            "  [{:17}] {}  {}  {}",
            record.record_type.to_string(),
            record.id,
            record.status.as_str(),
            record.name.as_deref().unwrap_or("(unnamed)"),
        );
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show one record with its validation details.
pub fn cmd_show(db_path: &Path, backend: &str, id: &str) -> Result<(), CaptureError> {
    let catalog = load_catalog(db_path, backend)?;
    let record = catalog.get(&RecordId::new(id))?;
    println!("{}", render(&record)?);

    if let Some(validation) = &record.validation {
        println!();
        println!("{}", format_validation_summary(validation));
    }
    Ok(())
}

// =============================================================================
// CAPTURE COMMAND
// =============================================================================

/// Run one capture operation with data from a JSON file.
pub async fn cmd_capture(
    db_path: &Path,
    backend: &str,
    schema_path: Option<&Path>,
    session: &str,
    record_type: &str,
    file: &Path,
    offline: bool,
) -> Result<(), CaptureError> {
    let metadata = std::fs::metadata(file)
        .map_err(|e| CaptureError::Storage(format!("Cannot read '{}': {e}", file.display())))?;
    if metadata.len() > MAX_CAPTURE_FILE_SIZE {
        return Err(CaptureError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CAPTURE_FILE_SIZE
        )));
    }

    let raw = std::fs::read_to_string(file)
        .map_err(|e| CaptureError::Storage(format!("Cannot read '{}': {e}", file.display())))?;
    let data = serde_json::from_str(&raw)
        .map_err(|e| CaptureError::Serialization(format!("Invalid JSON in capture file: {e}")))?;

    let record_type = RecordType::parse(record_type)?;
    let catalog = load_catalog(db_path, backend)?.into_shared();
    let schema = load_schema(schema_path)?;
    let provider = if offline {
        RegistryProvider::new()
    } else {
        registries::default_provider()
    };

    let outcome = capture(
        &catalog,
        &schema,
        &provider,
        None,
        CaptureRequest {
            session_id: session.to_string(),
            record_type,
            data,
            name: None,
            record_id: None,
            link_to: None,
        },
    )
    .await?;

    println!(
        "{} {} record {} ({})",
        outcome.action.as_str(),
        outcome.record.record_type,
        outcome.record.id,
        outcome.record.name.as_deref().unwrap_or("unnamed"),
    );
    println!();
    println!("{}", outcome.validation_summary);
    if !outcome.registry_summary.is_empty() {
        println!();
        println!("{}", outcome.registry_summary);
    }
    Ok(())
}

// =============================================================================
// DELETE-SESSION COMMAND
// =============================================================================

/// Remove a session's records and conversation history.
pub fn cmd_delete_session(db_path: &Path, backend: &str, id: &str) -> Result<(), CaptureError> {
    let mut catalog = load_catalog(db_path, backend)?;
    if catalog.delete_session(id)? {
        println!("Deleted session '{id}'.");
    } else {
        println!("Session '{id}' had no records or history.");
    }
    Ok(())
}
