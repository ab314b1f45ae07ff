//! Rate limiting for authentication endpoints.
//!
//! Token buckets keyed per client IP to slow down credential stuffing and
//! signup spam. Injected through `ServerConfig`; tests run without it.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-IP keyed limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
pub struct RateLimitConfig {
    /// Login attempts: 1 per second per IP with a burst of 5
    pub login: IpLimiter,
    /// Signups: 3 per minute per IP
    pub signup: IpLimiter,
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self {
            login: RateLimiter::keyed(
                Quota::per_second(NonZeroU32::new(1).expect("nonzero"))
                    .allow_burst(NonZeroU32::new(5).expect("nonzero")),
            ),
            signup: RateLimiter::keyed(Quota::per_minute(NonZeroU32::new(3).expect("nonzero"))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort client IP: X-Forwarded-For (first hop) when present,
/// otherwise the socket peer address.
pub fn client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

fn check(limiter: &IpLimiter, request: &Request, message: &'static str) -> Result<(), Response> {
    let Some(ip) = client_ip(request) else {
        // No peer info (e.g. in-process tests without a socket): let it pass
        return Ok(());
    };

    match limiter.check_key(&ip) {
        Ok(_) => Ok(()),
        Err(_) => Err((StatusCode::TOO_MANY_REQUESTS, message).into_response()),
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.login,
        &request,
        "Too many login attempts. Please wait before trying again.",
    ) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}

/// Middleware for rate limiting signups.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.signup,
        &request,
        "Too many signup attempts. Please wait before trying again.",
    ) {
        Ok(()) => next.run(request).await,
        Err(response) => response,
    }
}
