// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in: authorization-code exchange and ID token verification.

use crate::config::Config;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity asserted by Google for the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    /// Stable Google account subject
    pub google_id: String,
    /// Email as reported by Google (not yet normalized)
    pub email: String,
}

/// Google sign-in failure categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GoogleAuthError {
    /// The code, token or claims were not acceptable.
    #[error("Google sign-in rejected: {0}")]
    Rejected(String),
    /// Google could not be reached or answered garbage.
    #[error("Google sign-in unavailable: {0}")]
    Transient(String),
}

/// The OAuth identity provider seam.
#[async_trait]
pub trait GoogleIdentity: Send + Sync {
    /// Consent-screen URL carrying the given opaque `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Trade an authorization code for the verified account profile.
    async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, GoogleAuthError>;
}

/// Production Google OAuth client.
pub struct GoogleOAuthClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    verifier: GoogleIdTokenVerifier,
}

impl GoogleOAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google OAuth HTTP client")?;

        Ok(Self {
            verifier: GoogleIdTokenVerifier::new(http_client.clone(), &config.google_client_id),
            http_client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_callback_url.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[async_trait]
impl GoogleIdentity for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode("openid email"),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, GoogleAuthError> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| GoogleAuthError::Transient(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::Rejected(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(GoogleAuthError::Transient(format!(
                "token endpoint returned {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| GoogleAuthError::Transient(format!("invalid token JSON: {e}")))?;

        let id_token = tokens
            .id_token
            .ok_or_else(|| GoogleAuthError::Rejected("no id_token in response".to_string()))?;

        self.verifier.verify(&id_token).await
    }
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued OpenID Connect ID tokens.
pub struct GoogleIdTokenVerifier {
    http_client: reqwest::Client,
    expected_audience: String,
    mode: VerifierMode,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleIdTokenVerifier {
    /// Verifier that discovers and caches Google's JWKS keys.
    pub fn new(http_client: reqwest::Client, client_id: &str) -> Self {
        Self::with_mode(http_client, client_id, VerifierMode::Google)
    }

    /// Verifier with a single static RSA key, for deterministic tests.
    pub fn new_with_static_key(
        client_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static OIDC kid must not be empty");
        }

        Ok(Self::with_mode(
            reqwest::Client::new(),
            client_id,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        ))
    }

    fn with_mode(http_client: reqwest::Client, client_id: &str, mode: VerifierMode) -> Self {
        Self {
            http_client,
            expected_audience: client_id.to_string(),
            mode,
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Verify an ID token and extract the account profile.
    pub async fn verify(&self, token: &str) -> Result<GoogleProfile, GoogleAuthError> {
        let header = decode_header(token)
            .map_err(|e| GoogleAuthError::Rejected(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(GoogleAuthError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| GoogleAuthError::Rejected("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| GoogleAuthError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        tracing::debug!(
            subject = %claims.sub,
            email_verified = ?claims.email_verified,
            "Google ID token verified"
        );

        profile_from_claims(claims)
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, GoogleAuthError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            return Err(GoogleAuthError::Rejected(format!(
                "unknown JWT kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(GoogleAuthError::Rejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), GoogleAuthError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.resolve_jwks_uri(force_refresh).await;
        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| GoogleAuthError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GoogleAuthError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| GoogleAuthError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(GoogleAuthError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }

    /// Discovery document's `jwks_uri`, falling back to the last known or
    /// the well-known default when discovery is unavailable.
    async fn resolve_jwks_uri(&self, force_refresh: bool) -> String {
        let cached = self.discovery_cache.read().await.clone();
        if !force_refresh {
            if let Some(entry) = cached.as_ref().filter(|e| e.expires_at > Instant::now()) {
                return entry.jwks_uri.clone();
            }
        }
        let fallback = cached
            .map(|entry| entry.jwks_uri)
            .unwrap_or_else(|| DEFAULT_JWKS_URL.to_string());

        let resp = match self.http_client.get(DISCOVERY_URL).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "OIDC discovery failed; using fallback JWKS URI");
                return fallback;
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC discovery request failed; using fallback JWKS URI");
                return fallback;
            }
        };

        let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
        match resp.json::<OpenIdConfig>().await {
            Ok(discovery) => {
                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });
                discovery.jwks_uri
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid discovery JSON; using fallback JWKS URI");
                fallback
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn profile_from_claims(claims: GoogleIdTokenClaims) -> Result<GoogleProfile, GoogleAuthError> {
    let email = claims
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| GoogleAuthError::Rejected("No email found in Google profile".to_string()))?;

    if claims.email_verified != Some(true) {
        return Err(GoogleAuthError::Rejected(
            "Google has not verified this email".to_string(),
        ));
    }

    Ok(GoogleProfile {
        google_id: claims.sub,
        email,
    })
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}
