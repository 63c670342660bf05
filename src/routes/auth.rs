// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: OTP sign-up/sign-in, Google OAuth, session
//! refresh and the authenticated account endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::{check_verify_attempt, limit_otp_requests, require_auth, AuthUser};
use crate::models::PublicUser;
use crate::routes::extract::{
    validate_dob, validate_email, validate_name, validate_otp, ValidatedJson,
};
use crate::services::tokens::REFRESH_TOKEN_TTL_DAYS;
use crate::services::{normalize_email, AuthSuccess, GoogleAuthError, GoogleLogin};
use crate::time_utils::parse_dob;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HttpOnly cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// OAuth state older than this is rejected.
pub const OAUTH_STATE_MAX_AGE_MINUTES: i64 = 10;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let otp_dispatch = Router::new()
        .route("/auth/signup/send-otp", post(signup_send_otp))
        .route("/auth/signin/send-otp", post(signin_send_otp))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            limit_otp_requests,
        ));

    let protected = Router::new()
        .route("/auth/complete-profile", post(complete_profile))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/signup/verify-otp", post(signup_verify_otp))
        .route("/auth/signin/verify-otp", post(signin_verify_otp))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/refresh", post(refresh))
        .merge(otp_dispatch)
        .merge(protected)
}

// ─── Request / response bodies ───────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignupSendOtpRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(custom(function = "validate_dob"))]
    pub dob: String,
    #[validate(custom(function = "validate_email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupVerifyOtpRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(custom(function = "validate_dob"))]
    pub dob: String,
    #[validate(custom(function = "validate_email"))]
    pub email: String,
    #[validate(custom(function = "validate_otp"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninSendOtpRequest {
    #[validate(custom(function = "validate_email"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninVerifyOtpRequest {
    #[validate(custom(function = "validate_email"))]
    pub email: String,
    #[validate(custom(function = "validate_otp"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteProfileRequest {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(custom(function = "validate_dob"))]
    pub dob: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicUser,
    pub access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: PublicUser,
}

// ─── OTP ─────────────────────────────────────────────────────────

async fn signup_send_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<SignupSendOtpRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    let dob = parse_dob_field(&body.dob)?;

    let message = state
        .auth
        .signup_with_otp(body.name.trim(), dob, &email)
        .await?;

    Ok(Json(MessageResponse::new(message)))
}

async fn signin_send_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<SigninSendOtpRequest>,
) -> Result<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    let message = state.auth.signin_with_otp(&email).await?;
    Ok(Json(MessageResponse::new(message)))
}

async fn signup_verify_otp(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<SignupVerifyOtpRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let email = normalize_email(&body.email);
    let dob = parse_dob_field(&body.dob)?;
    check_verify_attempt(&state, &email)?;

    let success = state
        .auth
        .verify_signup_otp(body.name.trim(), dob, &email, &body.otp)
        .await?;

    Ok(session_response(&state, jar, success))
}

async fn signin_verify_otp(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<SigninVerifyOtpRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let email = normalize_email(&body.email);
    check_verify_attempt(&state, &email)?;

    let success = state.auth.verify_signin_otp(&email, &body.otp).await?;

    Ok(session_response(&state, jar, success))
}

fn session_response(
    state: &AppState,
    jar: CookieJar,
    success: AuthSuccess,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(refresh_cookie(
        success.tokens.refresh_token,
        state.config.secure_cookies(),
    ));

    (
        jar,
        Json(AuthResponse {
            message: success.message.to_string(),
            user: success.user,
            access_token: success.tokens.access_token,
        }),
    )
}

fn parse_dob_field(raw: &str) -> Result<chrono::NaiveDate> {
    parse_dob(raw).ok_or_else(|| {
        AppError::Validation("Date of birth must be a valid date (YYYY-MM-DD)".to_string())
    })
}

// ─── Google OAuth ────────────────────────────────────────────────

/// Start OAuth flow - redirect to Google's consent screen.
async fn google_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(&state.config.oauth_state_key, Utc::now())?;
    let auth_url = state.google.authorization_url(&oauth_state);

    tracing::info!("Starting OAuth flow, redirecting to Google");
    Ok(Redirect::temporary(&auth_url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback. Always redirects to the frontend; failures land on the
/// error page rather than returning JSON.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = &state.config.frontend_url;

    match finish_google_login(&state, params).await {
        Ok(login) => {
            let page = if login.needs_profile_completion {
                "complete-profile"
            } else {
                "success"
            };
            let redirect_url = format!(
                "{}/auth/{}?token={}",
                frontend_url,
                page,
                urlencoding::encode(&login.tokens.access_token)
            );

            tracing::info!(user_id = %login.user.id, page, "Google sign-in complete");

            let jar = jar.add(refresh_cookie(
                login.tokens.refresh_token,
                state.config.secure_cookies(),
            ));
            (jar, Redirect::temporary(&redirect_url))
        }
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!(error = %e, "Google sign-in failed");
            } else {
                tracing::warn!(error = %e, "Google sign-in rejected");
            }
            (
                jar,
                Redirect::temporary(&format!("{}/auth/error", frontend_url)),
            )
        }
    }
}

async fn finish_google_login(state: &AppState, params: CallbackParams) -> Result<GoogleLogin> {
    if let Some(error) = params.error {
        return Err(AppError::Authentication(format!(
            "Google returned an error: {}",
            error
        )));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::Authentication("Missing OAuth state".to_string()))?;
    if !verify_state(&oauth_state, &state.config.oauth_state_key, Utc::now()) {
        return Err(AppError::Authentication(
            "Invalid or expired OAuth state".to_string(),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Authentication("Missing authorization code".to_string()))?;

    let profile = state
        .google
        .exchange_code(&code)
        .await
        .map_err(|e| match e {
            GoogleAuthError::Rejected(msg) => AppError::Authentication(msg),
            GoogleAuthError::Transient(msg) => {
                AppError::Internal(anyhow::anyhow!("Google exchange failed: {}", msg))
            }
        })?;

    Ok(state.auth.handle_google_callback(&profile).await?)
}

/// Build a signed OAuth state: `base64url(timestamp_hex|nonce_hex|hmac_hex)`.
pub fn sign_state(key: &[u8], now: DateTime<Utc>) -> Result<String> {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);

    let payload = format!("{:x}|{}", now.timestamp_millis(), hex::encode(nonce));

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Check signature and age of an OAuth state produced by [`sign_state`].
pub fn verify_state(state: &str, key: &[u8], now: DateTime<Utc>) -> bool {
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };

    // Format is "timestamp_hex|nonce_hex|signature_hex"
    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let [timestamp_hex, nonce_hex, signature_hex] = parts[..] else {
        return false;
    };

    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(format!("{}|{}", timestamp_hex, nonce_hex).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    let Some(issued_at) = i64::from_str_radix(timestamp_hex, 16)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    else {
        return false;
    };

    let age = now - issued_at;
    age >= Duration::zero() && age <= Duration::minutes(OAUTH_STATE_MAX_AGE_MINUTES)
}

// ─── Session ─────────────────────────────────────────────────────

/// Rotate the refresh token. The token comes from the cookie, or failing
/// that from a JSON body `{ "refreshToken": ... }`.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<RefreshResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            serde_json::from_slice::<RefreshRequest>(&body)
                .ok()
                .and_then(|req| req.refresh_token)
                .filter(|value| !value.is_empty())
        })
        .ok_or_else(|| AppError::Authentication("Refresh token not provided".to_string()))?;

    let tokens = state.auth.refresh(&presented).await?;

    let jar = jar.add(refresh_cookie(
        tokens.refresh_token,
        state.config.secure_cookies(),
    ));
    Ok((
        jar,
        Json(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

async fn complete_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser { user }): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CompleteProfileRequest>,
) -> Result<Json<UserResponse>> {
    let dob = parse_dob_field(&body.dob)?;
    let user = state
        .auth
        .complete_profile(&user.id, body.name.trim(), dob)
        .await?;

    Ok(Json(UserResponse {
        message: Some("Profile completed successfully".to_string()),
        user,
    }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser { user }): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    let message = state.auth.logout(&user.id).await?;
    let jar = jar.add(expired_refresh_cookie(state.config.secure_cookies()));
    Ok((jar, Json(MessageResponse::new(message))))
}

async fn me(Extension(AuthUser { user }): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse {
        message: None,
        user: user.to_public(),
    })
}

// ─── Cookies ─────────────────────────────────────────────────────

fn refresh_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::days(REFRESH_TOKEN_TTL_DAYS))
        .build()
}

fn expired_refresh_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}
