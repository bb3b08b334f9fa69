//! # Labcap CLI Module
//!
//! This module implements the CLI interface for Labcap.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show catalog status
//! - `find` - Search records
//! - `show` - Show one record with validation details
//! - `capture` - Run a capture operation from a JSON file
//! - `delete-session` - Remove a session's records and history

mod commands;

use clap::{Parser, Subcommand};
use labcap_core::CaptureError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Labcap - Experiment Metadata Capture Server
///
/// Captures typed experiment-metadata records from conversational input,
/// validates them against controlled vocabularies, and cross-references
/// identifiers against external biological registries.
#[derive(Parser, Debug)]
#[command(name = "labcap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the record database
    #[arg(short = 'D', long, global = true, default_value = "labcap.redb")]
    pub database: PathBuf,

    /// Storage backend: "memory" (volatile) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Path to a TOML schema/vocabulary override file
    #[arg(short = 'S', long, global = true)]
    pub schema: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show catalog status
    Status,

    /// Search records
    Find {
        /// Record type filter (e.g. subject, procedures)
        #[arg(short = 't', long)]
        record_type: Option<String>,

        /// Category filter (shared, asset)
        #[arg(short, long)]
        category: Option<String>,

        /// Text query against name or data
        #[arg(short = 'Q', long)]
        query: Option<String>,
    },

    /// Show one record with validation details
    Show {
        /// The record id
        id: String,
    },

    /// Run a capture operation from a JSON file
    Capture {
        /// Capture session id
        #[arg(short, long)]
        session: String,

        /// Record type to capture
        #[arg(short = 't', long)]
        record_type: String,

        /// Path to a JSON file holding the record data
        #[arg(short, long)]
        file: PathBuf,

        /// Skip the external registry lookups
        #[arg(long)]
        offline: bool,
    },

    /// Remove a session's records and conversation history
    DeleteSession {
        /// The session id
        id: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CaptureError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, cli.schema.as_deref(), &host, port).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::Find {
            record_type,
            category,
            query,
        }) => cmd_find(
            &cli.database,
            backend,
            json_mode,
            record_type.as_deref(),
            category.as_deref(),
            query,
        ),
        Some(Commands::Show { id }) => cmd_show(&cli.database, backend, &id),
        Some(Commands::Capture {
            session,
            record_type,
            file,
            offline,
        }) => {
            cmd_capture(
                &cli.database,
                backend,
                cli.schema.as_deref(),
                &session,
                &record_type,
                &file,
                offline,
            )
            .await
        }
        Some(Commands::DeleteSession { id }) => cmd_delete_session(&cli.database, backend, &id),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}
