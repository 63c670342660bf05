// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication orchestration: OTP sign-up/sign-in, Google account
//! linking, profile completion, refresh-token rotation and logout.
//!
//! Every operation is a read-modify-write of one user record. Concurrent
//! requests for the same email are not serialized here; the last write wins.

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{PublicUser, User};
use crate::services::google::GoogleProfile;
use crate::services::notifier::{Notifier, OtpPurpose};
use crate::services::otp;
use crate::services::tokens::{AuthTokens, TokenError, TokenIssuer, TokenKind};
use crate::time_utils::meets_minimum_age;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// Why an authentication operation failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User already exists with this email. Please sign in instead.")]
    AlreadyExists,

    #[error("No account found with this email. Please sign up first.")]
    AccountNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("User already verified. Please sign in instead.")]
    AlreadyVerified,

    #[error("No OTP found. Please request a new one.")]
    NoChallenge,

    #[error("OTP has expired")]
    Expired,

    #[error("Invalid OTP")]
    InvalidCode,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// Store or notifier failure.
    #[error(transparent)]
    Backend(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AlreadyExists => AppError::Conflict(err.to_string()),
            AuthError::AccountNotFound => AppError::NotFound(err.to_string()),
            AuthError::UserNotFound
            | AuthError::AlreadyVerified
            | AuthError::NoChallenge
            | AuthError::Expired
            | AuthError::InvalidCode => AppError::Authentication(err.to_string()),
            AuthError::InvalidRefreshToken => AppError::InvalidToken,
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Token(e) => AppError::Internal(anyhow::anyhow!("token issuance failed: {e}")),
            AuthError::Backend(e) => e,
        }
    }
}

/// Result of a successful OTP verification.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub message: &'static str,
    pub user: PublicUser,
    pub tokens: AuthTokens,
}

/// Result of a successful Google callback.
#[derive(Debug, Clone)]
pub struct GoogleLogin {
    pub user: PublicUser,
    pub tokens: AuthTokens,
    /// Name or date of birth still missing; route to profile completion.
    pub needs_profile_completion: bool,
}

/// Lowercase and trim an email before any lookup or storage.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Stateless authentication service; collaborators are injected once.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>, tokens: TokenIssuer) -> Self {
        Self {
            users,
            notifier,
            tokens,
        }
    }

    // ─── OTP Dispatch ────────────────────────────────────────────

    /// Start a sign-up: create or refresh an unverified user and email a code.
    pub async fn signup_with_otp(
        &self,
        name: &str,
        dob: NaiveDate,
        email: &str,
    ) -> Result<&'static str, AuthError> {
        let now = Utc::now();
        let code = otp::generate_otp();

        match self.users.find_by_email(email).await? {
            Some(user) if user.is_email_verified => return Err(AuthError::AlreadyExists),
            Some(mut user) => {
                user.name = Some(name.to_string());
                user.dob = Some(dob);
                user.set_otp(code.clone(), otp::expiry_from(now));
                user.updated_at = now;
                self.users.update_user(&user).await?;
            }
            None => {
                let mut user = User::new_unverified(email, now);
                user.name = Some(name.to_string());
                user.dob = Some(dob);
                user.set_otp(code.clone(), otp::expiry_from(now));
                self.users.insert_user(&user).await?;
                tracing::info!(user_id = %user.id, "Unverified user created");
            }
        }

        self.notifier
            .notify(email, &code, OtpPurpose::Signup)
            .await?;

        Ok("OTP sent to your email. Please verify to complete signup.")
    }

    /// Start a sign-in: overwrite the user's challenge and email a code.
    pub async fn signin_with_otp(&self, email: &str) -> Result<&'static str, AuthError> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let now = Utc::now();
        let code = otp::generate_otp();
        user.set_otp(code.clone(), otp::expiry_from(now));
        user.updated_at = now;
        self.users.update_user(&user).await?;

        self.notifier
            .notify(email, &code, OtpPurpose::Signin)
            .await?;

        Ok("OTP sent to your email. Please verify to sign in.")
    }

    // ─── OTP Verification ────────────────────────────────────────

    /// Finish a sign-up. Only unverified users may take this path.
    ///
    /// A verified user with no pending challenge gets `NoChallenge`, so a
    /// replayed verification reports the consumed code rather than the
    /// account state.
    pub async fn verify_signup_otp(
        &self,
        name: &str,
        dob: NaiveDate,
        email: &str,
        code: &str,
    ) -> Result<AuthSuccess, AuthError> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.otp.is_none() {
            return Err(AuthError::NoChallenge);
        }
        if user.is_email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let now = Utc::now();
        check_challenge(&user, code, now)?;

        user.name = Some(name.to_string());
        user.dob = Some(dob);
        user.is_email_verified = true;
        user.clear_otp();
        let tokens = self.start_session(&mut user, now).await?;

        tracing::info!(user_id = %user.id, "Signup verified");

        Ok(AuthSuccess {
            message: "Account created successfully",
            user: user.to_public(),
            tokens,
        })
    }

    /// Finish a sign-in. Verification status is set idempotently.
    pub async fn verify_signin_otp(&self, email: &str, code: &str) -> Result<AuthSuccess, AuthError> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = Utc::now();
        check_challenge(&user, code, now)?;

        user.is_email_verified = true;
        user.clear_otp();
        let tokens = self.start_session(&mut user, now).await?;

        tracing::info!(user_id = %user.id, "Signin verified");

        Ok(AuthSuccess {
            message: "Signed in successfully",
            user: user.to_public(),
            tokens,
        })
    }

    // ─── Google ──────────────────────────────────────────────────

    /// Resolve a Google identity to a user (by Google ID, then by email,
    /// else a new account) and start a session for it.
    pub async fn handle_google_callback(
        &self,
        profile: &GoogleProfile,
    ) -> Result<GoogleLogin, AuthError> {
        let email = normalize_email(&profile.email);
        let now = Utc::now();

        let (mut user, is_new) = match self.users.find_by_google_id(&profile.google_id).await? {
            Some(user) => (user, false),
            None => match self.users.find_by_email(&email).await? {
                Some(mut user) => {
                    if let Some(previous) = user.google_id.as_deref() {
                        tracing::warn!(
                            user_id = %user.id,
                            previous,
                            "Relinking account to a different Google ID"
                        );
                    }
                    user.google_id = Some(profile.google_id.clone());
                    user.is_email_verified = true;
                    tracing::info!(user_id = %user.id, "Google account linked");
                    (user, false)
                }
                None => (User::new_from_google(&profile.google_id, &email, now), true),
            },
        };

        let tokens = self.tokens.issue(&user.id)?;
        user.refresh_token = Some(tokens.refresh_token.clone());
        user.updated_at = now;

        if is_new {
            self.users.insert_user(&user).await?;
            tracing::info!(user_id = %user.id, "User created from Google sign-in");
        } else {
            self.users.update_user(&user).await?;
        }

        Ok(GoogleLogin {
            needs_profile_completion: user.needs_profile_completion(),
            user: user.to_public(),
            tokens,
        })
    }

    /// Fill in name and date of birth (Google sign-ups).
    pub async fn complete_profile(
        &self,
        user_id: &str,
        name: &str,
        dob: NaiveDate,
    ) -> Result<PublicUser, AuthError> {
        if !meets_minimum_age(dob, Utc::now().date_naive()) {
            return Err(AuthError::Validation(
                "You must be at least 13 years old".to_string(),
            ));
        }

        let mut user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        user.name = Some(name.to_string());
        user.dob = Some(dob);
        user.updated_at = Utc::now();
        self.users.update_user(&user).await?;

        tracing::info!(user_id = %user.id, "Profile completed");
        Ok(user.to_public())
    }

    // ─── Session ─────────────────────────────────────────────────

    /// Exchange the current refresh token for a new pair, rotating the stored
    /// token so the presented one stops working.
    pub async fn refresh(&self, presented: &str) -> Result<AuthTokens, AuthError> {
        let claims = self
            .tokens
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| {
                tracing::debug!(error = %e, "Refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        let mut user = self
            .users
            .find_by_refresh_token(presented)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if user.id != claims.sub {
            tracing::warn!(user_id = %user.id, "Refresh token subject mismatch");
            return Err(AuthError::InvalidRefreshToken);
        }

        let tokens = self.start_session(&mut user, Utc::now()).await?;
        Ok(tokens)
    }

    /// Forget the user's refresh token. Safe to call repeatedly.
    pub async fn logout(&self, user_id: &str) -> Result<&'static str, AuthError> {
        self.users.clear_refresh_token(user_id).await?;
        tracing::info!(user_id, "Logged out");
        Ok("Logged out successfully")
    }

    /// Issue a pair and make its refresh token the only one honoured.
    async fn start_session(
        &self,
        user: &mut User,
        now: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        let tokens = self.tokens.issue(&user.id)?;
        user.refresh_token = Some(tokens.refresh_token.clone());
        user.updated_at = now;
        self.users.update_user(user).await?;
        Ok(tokens)
    }
}

/// Challenge checks in order: present, unexpired, matching. Never mutates.
fn check_challenge(user: &User, presented: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
    let challenge = user.otp.as_ref().ok_or(AuthError::NoChallenge)?;

    if !otp::is_valid(challenge.expires_at, now) {
        return Err(AuthError::Expired);
    }
    if !otp::codes_match(&challenge.code, presented) {
        return Err(AuthError::InvalidCode);
    }
    Ok(())
}
