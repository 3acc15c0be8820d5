//! Rate limiting middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;

/// Shared rate limiter type.
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a rate limiter with the specified RPM quota.
#[must_use]
pub fn create_rate_limiter(requests_per_minute: NonZeroU32) -> SharedRateLimiter {
    Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute)))
}

/// Rate limiting middleware.
///
/// # Errors
///
/// Returns [`ApiError::RateLimitExceeded`] once the quota is used up.
pub async fn rate_limit(
    limiter: SharedRateLimiter,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        debug!(uri = %request.uri(), "Request rejected by rate limiter");
        return Err(ApiError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}
