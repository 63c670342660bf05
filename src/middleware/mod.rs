// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, rate limiting, security headers).

pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use rate_limit::{
    check_verify_attempt, limit_all_requests, limit_otp_requests, RateLimits, WindowRateLimiter,
};
