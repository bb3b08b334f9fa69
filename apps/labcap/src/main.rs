//! # Labcap - Experiment Metadata Capture Server
//!
//! The main binary for the Labcap capture engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog operations
//! - Concrete registry backends (Addgene, NCBI Gene, MGI)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/labcap (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │ Registry backends│   │
//! │  │  (clap)     │    │   (axum)    │    │   (reqwest)      │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │  labcap-core  │                           │
//! │                    │ (THE LOGIC)   │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! labcap server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! labcap status
//! labcap find -t subject -Q 4528
//! labcap capture -s demo -t subject -f subject.json
//! ```

mod api;
mod cli;
mod registries;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — LABCAP_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("LABCAP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "labcap=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Labcap startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗      █████╗ ██████╗  ██████╗ █████╗ ██████╗
  ██║     ██╔══██╗██╔══██╗██╔════╝██╔══██╗██╔══██╗
  ██║     ███████║██████╔╝██║     ███████║██████╔╝
  ██║     ██╔══██║██╔══██╗██║     ██╔══██║██╔═══╝
  ███████╗██║  ██║██████╔╝╚██████╗██║  ██║██║
  ╚══════╝╚═╝  ╚═╝╚═════╝  ╚═════╝╚═╝  ╚═╝╚═╝

  Experiment Metadata Capture v{}

  Typed • Validated • Cross-referenced
"#,
        env!("CARGO_PKG_VERSION")
    );
}
