//! User model for storage and API.

use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outstanding one-time passcode. Code and expiry only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Six-digit code as sent to the user
    pub code: String,
    /// First instant at which the code is no longer accepted
    pub expires_at: DateTime<Utc>,
}

/// User record stored in the credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque unique identifier (UUID v4, also the document ID)
    pub id: String,
    /// Display name; absent only for Google sign-ups pending profile completion
    pub name: Option<String>,
    /// Date of birth; same absence rule as `name`
    pub dob: Option<NaiveDate>,
    /// Lowercased, trimmed email (unique)
    pub email: String,
    /// Google account subject (unique when present)
    pub google_id: Option<String>,
    /// Set once the email is proven; never reset
    pub is_email_verified: bool,
    /// Current OTP challenge, if one is outstanding
    pub otp: Option<OtpChallenge>,
    /// The single refresh token currently honoured for this user
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh, unverified user created by an OTP sign-up request.
    pub fn new_unverified(email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: None,
            dob: None,
            email: email.to_string(),
            google_id: None,
            is_email_verified: false,
            otp: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A user created by a first Google sign-in. Google emails are pre-verified.
    pub fn new_from_google(google_id: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            google_id: Some(google_id.to_string()),
            is_email_verified: true,
            ..Self::new_unverified(email, now)
        }
    }

    /// Replace any outstanding challenge.
    pub fn set_otp(&mut self, code: String, expires_at: DateTime<Utc>) {
        self.otp = Some(OtpChallenge { code, expires_at });
    }

    pub fn clear_otp(&mut self) {
        self.otp = None;
    }

    /// Name or date of birth still missing (Google sign-ups).
    pub fn needs_profile_completion(&self) -> bool {
        self.name.is_none() || self.dob.is_none()
    }

    /// Fields safe to hand back to the account owner.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            dob: self.dob.map(|d| d.format("%Y-%m-%d").to_string()),
            email: self.email.clone(),
            is_email_verified: self.is_email_verified,
            has_google_auth: self.google_id.is_some(),
            created_at: format_utc_rfc3339(self.created_at),
        }
    }
}

/// User as returned by the API. Never carries OTP or token material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct PublicUser {
    pub id: String,
    pub name: Option<String>,
    pub dob: Option<String>,
    pub email: String,
    pub is_email_verified: bool,
    pub has_google_auth: bool,
    pub created_at: String,
}
