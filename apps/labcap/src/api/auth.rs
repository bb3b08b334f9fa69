//! # Authentication Module
//!
//! Bearer-key authentication for the Labcap HTTP API.
//!
//! The expected key is resolved once when the router is built (from
//! `LABCAP_API_KEY`) and carried in middleware state; requests present
//! it as `Authorization: Bearer <key>`. `/health` stays open so load
//! balancers can probe without credentials.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// API KEY
// =============================================================================

/// The configured API key, shared across requests.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// Resolve the key from `LABCAP_API_KEY`.
    ///
    /// Returns None when unset or empty, which disables authentication.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("LABCAP_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|k| Self(Arc::from(k.as_str())))
    }

    /// Constant-time check of a presented key.
    ///
    /// Both sides are padded to a common length before `ct_eq` so the
    /// comparison touches the same number of bytes either way, then the
    /// true lengths are required to match.
    fn accepts(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        let width = expected.len().max(presented.len());
        let mut lhs = vec![0u8; width];
        let mut rhs = vec![0u8; width];
        lhs[..expected.len()].copy_from_slice(expected);
        rhs[..presented.len()].copy_from_slice(presented);

        let bytes_match: bool = lhs.ct_eq(&rhs).into();
        bytes_match && expected.len() == presented.len()
    }
}

/// Whether authentication is configured, for router construction.
#[must_use]
pub fn get_api_key_from_env() -> Option<ApiKey> {
    ApiKey::from_env()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Bearer-key middleware, installed only when a key is configured.
pub async fn api_key_auth_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    // Health checks stay open for load balancers.
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match presented {
        Some(presented) if key.accepts(presented) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                "Authentication failed: invalid API key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_key_only() {
        let key = ApiKey(Arc::from("secret-key"));
        assert!(key.accepts("secret-key"));
        assert!(!key.accepts("secret-ke"));
        assert!(!key.accepts("secret-key-longer"));
        assert!(!key.accepts(""));
    }

    #[test]
    fn unset_env_disables_auth() {
        // SAFETY: This is a unit test running in isolation.
        unsafe { std::env::remove_var("LABCAP_API_KEY") };
        assert!(ApiKey::from_env().is_none());
    }
}
