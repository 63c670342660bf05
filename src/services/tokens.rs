// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access/refresh token issuance and verification.
//!
//! Both tokens are HS256 JWTs carrying the user ID, signed with separate
//! keys so an access token can never be presented as a refresh token.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
/// Refresh token lifetime.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token ID; keeps two pairs minted in the same second distinct
    pub jti: String,
}

/// Which key a token is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Freshly issued token pair. Only the refresh token is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Signs and verifies token pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_access_secret, &config.jwt_refresh_secret)
    }

    /// Issue a new access/refresh pair for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<AuthTokens, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a pair as if the current time were `now`.
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<AuthTokens, TokenError> {
        let access_token = self.sign(
            user_id,
            now,
            Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            &self.access_encoding,
        )?;
        let refresh_token = self.sign(
            user_id,
            now,
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
            &self.refresh_encoding,
        )?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    /// Check signature and expiry; returns the claims on success.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })
    }

    fn sign(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
        key: &EncodingKey,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}
