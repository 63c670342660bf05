// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod google;
pub mod notifier;
pub mod otp;
pub mod tokens;

pub use auth::{normalize_email, AuthError, AuthService, AuthSuccess, GoogleLogin};
pub use google::{GoogleAuthError, GoogleIdentity, GoogleOAuthClient, GoogleProfile};
pub use notifier::{LogNotifier, Notifier, OtpPurpose, SendGridNotifier};
pub use tokens::{AuthTokens, Claims, TokenError, TokenIssuer, TokenKind};
