//! # Labcap MCP Server
//!
//! Entry point for the MCP (Model Context Protocol) bridge to Labcap.
//!
//! Reads configuration from environment variables:
//! - `LABCAP_URL` — Labcap server URL (default: `http://localhost:8080`)
//! - `LABCAP_API_KEY` — Optional Bearer token for authentication
//!
//! Communicates with AI clients via MCP over stdio, and forwards
//! requests to the Labcap HTTP API.

mod client;
mod server;

use client::LabcapClient;
use rmcp::{ServiceExt, transport::stdio};
use server::LabcapMcp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging to stderr only — stdout is reserved for MCP stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::var("LABCAP_URL").unwrap_or_else(|_| "http://localhost:8080".into());
    let api_key = std::env::var("LABCAP_API_KEY").ok();

    tracing::info!("Labcap MCP server starting, target: {}", url);

    let client = LabcapClient::new(url, api_key);
    let mcp = LabcapMcp::new(client);

    let service = mcp.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("MCP serve error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
