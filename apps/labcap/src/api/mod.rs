//! # Labcap HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /capture` - One capture operation (write + validate + registries)
//! - `POST /records` - Create a record
//! - `GET /records` - Search records (type/category/status/text filters)
//! - `GET /records/{id}` - Fetch a record
//! - `PATCH /records/{id}` - Merge data / rename
//! - `DELETE /records/{id}` - Delete a record and its links
//! - `POST /records/{id}/confirm` - Confirm a record
//! - `GET /records/{id}/linked` - Records linked to this one
//! - `POST /links` / `DELETE /links` - Link / unlink two records
//! - `GET /sessions` - Session summaries
//! - `GET /sessions/{id}/records` - Records captured in a session
//! - `POST /sessions/{id}/turns` / `GET /sessions/{id}/turns` - Conversation history
//! - `DELETE /sessions/{id}` - Delete a session's records and history
//! - `GET /health` - Health check
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `LABCAP_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `LABCAP_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `LABCAP_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `labcap::api::*`)
#[allow(unused_imports)]
pub use types::{
    CaptureApiRequest, CaptureResponse, CreateRecordRequest, DeleteResponse, ErrorResponse,
    FindParams, FindResponse, HealthResponse, HistoryResponse, LinkRequest, LinkResponse,
    RecordSummary, SessionsResponse, TurnRequest, UpdateRecordRequest,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use labcap_core::{Catalog, CaptureError, RegistryProvider, SchemaConfig, SharedCatalog};
use std::sync::Arc;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the catalog plus the injected schema and
/// registry providers.
#[derive(Clone)]
pub struct AppState {
    /// The record catalog.
    pub catalog: SharedCatalog,
    /// Controlled vocabularies and field tables.
    pub schema: Arc<SchemaConfig>,
    /// Registry lookup backends.
    pub registries: Arc<RegistryProvider>,
}

impl AppState {
    /// Create new app state around a catalog.
    #[must_use]
    pub fn new(catalog: Catalog, schema: SchemaConfig, registries: RegistryProvider) -> Self {
        Self {
            catalog: catalog.into_shared(),
            schema: Arc::new(schema),
            registries: Arc::new(registries),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `LABCAP_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::CorsLayer;

    let origins_env = std::env::var("LABCAP_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (LABCAP_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in LABCAP_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No LABCAP_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> tower_http::cors::CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    tower_http::cors::CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. CORS - handles preflight requests
/// 2. Tracing - logs all requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = get_api_key_from_env();
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set LABCAP_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/capture", post(handlers::capture_handler))
        .route(
            "/records",
            post(handlers::create_record_handler).get(handlers::find_records_handler),
        )
        .route(
            "/records/{id}",
            get(handlers::get_record_handler)
                .patch(handlers::update_record_handler)
                .delete(handlers::delete_record_handler),
        )
        .route("/records/{id}/confirm", post(handlers::confirm_record_handler))
        .route("/records/{id}/linked", get(handlers::linked_records_handler))
        .route(
            "/links",
            post(handlers::create_link_handler).delete(handlers::delete_link_handler),
        )
        .route("/sessions", get(handlers::list_sessions_handler))
        .route(
            "/sessions/{id}/records",
            get(handlers::session_records_handler),
        )
        .route(
            "/sessions/{id}/turns",
            post(handlers::save_turn_handler).get(handlers::session_history_handler),
        )
        .route("/sessions/{id}", delete(handlers::delete_session_handler));

    // Apply authentication middleware (innermost - runs last on request)
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    // Apply rate limiting middleware
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CaptureError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CaptureError::Storage(format!("Bind failed: {}", e)))?;

    tracing::info!("Labcap HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CaptureError::Storage(format!("Server error: {}", e)))
}
