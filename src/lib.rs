// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! OTP Notes API: passwordless sign-in and personal notes.
//!
//! Users authenticate with an emailed one-time passcode or with Google,
//! receive a short-lived access token plus a rotating refresh token, and
//! keep private notes behind the access guard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{NoteStore, UserStore};
use middleware::RateLimits;
use services::{AuthService, GoogleIdentity, Notifier, TokenIssuer};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub notes: Arc<dyn NoteStore>,
    pub tokens: TokenIssuer,
    pub auth: AuthService,
    pub google: Arc<dyn GoogleIdentity>,
    pub rate_limits: RateLimits,
}

impl AppState {
    /// Wire the services together over the given collaborators.
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        notes: Arc<dyn NoteStore>,
        notifier: Arc<dyn Notifier>,
        google: Arc<dyn GoogleIdentity>,
    ) -> Self {
        let tokens = TokenIssuer::from_config(&config);
        let auth = AuthService::new(users.clone(), notifier, tokens.clone());
        let rate_limits = RateLimits::new(
            config.global_rate_limit,
            config.otp_rate_limit,
            config.verify_rate_limit,
        );

        Self {
            config,
            users,
            notes,
            tokens,
            auth,
            google,
            rate_limits,
        }
    }
}
