// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request},
    response::Response,
    Router,
};
use otp_notes_api::config::Config;
use otp_notes_api::db::{FirestoreDb, MemoryDb};
use otp_notes_api::error::AppError;
use otp_notes_api::routes::create_router;
use otp_notes_api::services::{GoogleAuthError, GoogleIdentity, GoogleProfile, Notifier, OtpPurpose};
use otp_notes_api::AppState;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Collaborator stubs ──────────────────────────────────────────

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SentOtp {
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

/// Notifier that keeps every code it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentOtp>>,
    fail: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn last_for(&self, email: &str) -> Option<SentOtp> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|sent| sent.email == email)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        if *self.fail.lock().unwrap() {
            return Err(AppError::Notifier("mail relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentOtp {
            email: email.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }
}

/// Google provider that returns whatever outcome the test configured.
pub struct StubGoogle {
    outcome: Mutex<Result<GoogleProfile, GoogleAuthError>>,
}

impl Default for StubGoogle {
    fn default() -> Self {
        Self {
            outcome: Mutex::new(Err(GoogleAuthError::Rejected(
                "no profile configured".to_string(),
            ))),
        }
    }
}

#[allow(dead_code)]
impl StubGoogle {
    pub fn returns(&self, google_id: &str, email: &str) {
        *self.outcome.lock().unwrap() = Ok(GoogleProfile {
            google_id: google_id.to_string(),
            email: email.to_string(),
        });
    }

    pub fn fails(&self, err: GoogleAuthError) {
        *self.outcome.lock().unwrap() = Err(err);
    }
}

#[async_trait]
impl GoogleIdentity for StubGoogle {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.google.test/o/oauth2/v2/auth?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, GoogleAuthError> {
        if code == "bad-code" {
            return Err(GoogleAuthError::Rejected("invalid_grant".to_string()));
        }
        self.outcome.lock().unwrap().clone()
    }
}

// ─── App harness ─────────────────────────────────────────────────

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub notifier: Arc<RecordingNotifier>,
    pub google: Arc<StubGoogle>,
}

/// Create a test app over the in-memory store.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = MemoryDb::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let google = Arc::new(StubGoogle::default());

    let state = Arc::new(AppState::new(
        config,
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        notifier.clone(),
        google.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        notifier,
        google,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Run sign-up end to end; returns the verify response body and the
    /// refresh cookie value.
    pub async fn sign_up(&self, name: &str, dob: &str, email: &str) -> (Value, String) {
        let response = self
            .send(json_request(
                "POST",
                "/auth/signup/send-otp",
                serde_json::json!({ "name": name, "dob": dob, "email": email }),
            ))
            .await;
        assert_eq!(response.status(), 200, "send-otp failed");

        let code = self
            .notifier
            .last_for(&email.trim().to_lowercase())
            .expect("no OTP recorded")
            .code;

        let response = self
            .send(json_request(
                "POST",
                "/auth/signup/verify-otp",
                serde_json::json!({ "name": name, "dob": dob, "email": email, "otp": code }),
            ))
            .await;
        assert_eq!(response.status(), 200, "verify-otp failed");

        let refresh = refresh_cookie(&response).expect("no refresh cookie");
        (body_json(response).await, refresh)
    }
}

// ─── Request / response helpers ──────────────────────────────────

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Attach a socket peer the way `into_make_service_with_connect_info` does.
#[allow(dead_code)]
pub fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().expect("peer must be ip:port");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Value of the `refreshToken` cookie set by `response`, if any.
#[allow(dead_code)]
pub fn refresh_cookie(response: &Response) -> Option<String> {
    set_cookie_headers(response).iter().find_map(|cookie| {
        cookie
            .strip_prefix("refreshToken=")
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}
