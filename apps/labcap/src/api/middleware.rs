//! # Middleware Module
//!
//! Request throttling for the Labcap HTTP API.
//!
//! A single process-wide governor bucket protects the capture endpoints;
//! `LABCAP_RATE_LIMIT` sets the refill rate in requests per second, and
//! 0 disables the layer entirely.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Fallback refill rate when the configured value is unusable.
const DEFAULT_RPS: NonZeroU32 = NonZeroU32::new(100).unwrap();

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build the process-wide limiter for the given requests-per-second rate.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Read `LABCAP_RATE_LIMIT` (requests per second; 0 disables, default 100).
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("LABCAP_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

/// Reject requests beyond the bucket's budget with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limiter.check().is_ok() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded");
        Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"))
    }
}

// =============================================================================
// TESTS
// =============================================================================
