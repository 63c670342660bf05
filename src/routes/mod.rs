// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod auth;
pub mod extract;
pub mod notes;

use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
}

/// Health check response
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: format_utc_rfc3339(Utc::now()),
        environment: state.config.environment.as_str().to_string(),
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Credentialed CORS needs an exact origin, not a wildcard.
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);
    let cors = match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "FRONTEND_URL is not a valid origin, CORS disabled");
            cors
        }
    };

    Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes(&state))
        .merge(notes::routes(&state))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::limit_all_requests,
        ))
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
