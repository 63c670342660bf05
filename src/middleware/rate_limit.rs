// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Keyed rate limiting.
//!
//! Three budgets share one window: every request per client, OTP sends per
//! client, and OTP verify attempts per email address. Clients are keyed by
//! socket peer; `X-Forwarded-For` is only consulted when the service is
//! configured to sit behind a trusted proxy.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Length of every rate-limit window.
pub const RATE_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Bucket used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

type KeyedStateStore = DashMapStateStore<String>;

/// Keyed limiter: `limit` requests per key per [`RATE_WINDOW`].
pub struct WindowRateLimiter {
    limiter: RateLimiter<String, KeyedStateStore, DefaultClock>,
}

impl WindowRateLimiter {
    pub fn new(limit: u32) -> Self {
        let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        let period = RATE_WINDOW / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Consume one request for `key`; false once the budget is spent.
    pub fn check(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Drop state for keys whose budget has fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

/// The limiters held in application state.
pub struct RateLimits {
    pub global: WindowRateLimiter,
    pub otp_send: WindowRateLimiter,
    pub otp_verify: WindowRateLimiter,
}

impl RateLimits {
    pub fn new(global: u32, otp_send: u32, otp_verify: u32) -> Self {
        Self {
            global: WindowRateLimiter::new(global),
            otp_send: WindowRateLimiter::new(otp_send),
            otp_verify: WindowRateLimiter::new(otp_verify),
        }
    }

    pub fn retain_recent(&self) {
        self.global.retain_recent();
        self.otp_send.retain_recent();
        self.otp_verify.retain_recent();
    }
}

/// Router-wide per-client budget.
pub async fn limit_all_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request_client(&state, &request);

    if !state.rate_limits.global.check(&client) {
        tracing::warn!(client = %client, "Request rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

/// Middleware for routes that dispatch OTP emails.
pub async fn limit_otp_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = request_client(&state, &request);

    if !state.rate_limits.otp_send.check(&client) {
        tracing::warn!(client = %client, "OTP rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

/// Count one verify attempt against `email`.
pub fn check_verify_attempt(state: &AppState, email: &str) -> Result<(), AppError> {
    if state.rate_limits.otp_verify.check(email) {
        Ok(())
    } else {
        tracing::warn!(email = %email, "OTP verify attempts exceeded");
        Err(AppError::RateLimited)
    }
}

fn request_client(state: &AppState, request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_key(request.headers(), peer, state.config.trust_proxy)
}

/// Socket peer IP. Behind a trusted proxy, the first `X-Forwarded-For` hop
/// wins instead. Falls back to a shared bucket.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_key_ignores_forwarded_for_by_default() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let headers = forwarded("203.0.113.7, 10.0.0.1");

        assert_eq!(client_key(&headers, Some(peer), false), "127.0.0.1");
        assert_eq!(client_key(&headers, None, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_key_behind_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        assert_eq!(
            client_key(&forwarded("203.0.113.7, 10.0.0.1"), Some(peer), true),
            "203.0.113.7"
        );
        assert_eq!(client_key(&forwarded(" "), Some(peer), true), "10.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "10.0.0.1");
    }

    #[test]
    fn test_limiter_budget_is_per_key() {
        let limiter = WindowRateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.check("a"));
        }
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_zero_limit_still_allows_one() {
        let limiter = WindowRateLimiter::new(0);
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
    }
}
