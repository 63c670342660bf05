// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Signing secrets are read once at startup and handed to the services that
//! need them; nothing reads them ad hoc afterwards.

use std::env;

const DEV_OAUTH_STATE_KEY: &[u8] = b"dev_oauth_state_key_not_for_prod";

/// Deployment environment. Controls cookie `Secure` and secret strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Where Google sends the user back after consent
    pub google_callback_url: String,
    /// GCP project for Firestore. `None` selects the in-memory store.
    pub gcp_project_id: Option<String>,
    /// Sender address for OTP emails
    pub email_from: String,
    /// OTP send requests allowed per client per 15-minute window
    pub otp_rate_limit: u32,
    /// OTP verify attempts allowed per email per 15-minute window
    pub verify_rate_limit: u32,
    /// Requests of any kind allowed per client per 15-minute window
    pub global_rate_limit: u32,
    /// Key clients by `X-Forwarded-For` (only set behind a trusted proxy)
    pub trust_proxy: bool,

    // --- Secrets ---
    /// HMAC key for access tokens
    pub jwt_access_secret: Vec<u8>,
    /// HMAC key for refresh tokens (must differ from the access key)
    pub jwt_refresh_secret: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// SendGrid API key. `None` logs codes instead of emailing them.
    pub sendgrid_api_key: Option<String>,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Development,
            frontend_url: "http://localhost:3000".to_string(),
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            google_callback_url: "http://localhost:8080/auth/google/callback".to_string(),
            gcp_project_id: None,
            email_from: "no-reply@localhost".to_string(),
            otp_rate_limit: 5,
            verify_rate_limit: 10,
            global_rate_limit: 1000,
            trust_proxy: false,
            jwt_access_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            jwt_refresh_secret: b"test_refresh_secret_32_bytes_min".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!".to_vec(),
            google_client_secret: "test_google_secret".to_string(),
            sendgrid_api_key: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = Environment::parse(&env::var("APP_ENV").unwrap_or_default());

        let jwt_access_secret = required("JWT_SECRET")?.into_bytes();
        let jwt_refresh_secret = required("JWT_REFRESH_SECRET")?.into_bytes();
        if jwt_access_secret == jwt_refresh_secret {
            return Err(ConfigError::Invalid(
                "JWT_SECRET and JWT_REFRESH_SECRET must differ",
            ));
        }

        let oauth_state_key = match env::var("OAUTH_STATE_KEY") {
            Ok(key) if !key.trim().is_empty() => key.trim().as_bytes().to_vec(),
            _ if environment == Environment::Production => {
                return Err(ConfigError::Missing("OAUTH_STATE_KEY"));
            }
            _ => {
                tracing::warn!("OAUTH_STATE_KEY not set, using development key");
                DEV_OAUTH_STATE_KEY.to_vec()
            }
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            environment,
            frontend_url: env::var("FRONTEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_callback_url: env::var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:8080/auth/google/callback".to_string()),
            gcp_project_id: optional("GCP_PROJECT_ID"),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string()),
            otp_rate_limit: positive("OTP_RATE_LIMIT", 5)?,
            verify_rate_limit: positive("VERIFY_RATE_LIMIT", 10)?,
            global_rate_limit: positive("GLOBAL_RATE_LIMIT", 1000)?,
            trust_proxy: matches!(
                optional("TRUST_PROXY").map(|v| v.to_ascii_lowercase()).as_deref(),
                Some("true" | "1" | "yes")
            ),

            jwt_access_secret,
            jwt_refresh_secret,
            oauth_state_key,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            sendgrid_api_key: optional("SENDGRID_API_KEY"),
        })
    }

    /// Whether cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn positive(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match optional(name) {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::NotPositive(name)),
        None => Ok(default),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),

    #[error("{0} must be a positive integer")]
    NotPositive(&'static str),
}
