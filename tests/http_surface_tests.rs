// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health check, security headers and CORS.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use otp_notes_api::config::{Config, Environment};

mod common;
use common::{body_json, create_test_app, create_test_app_with_config};

#[tokio::test]
async fn test_health() {
    let app = create_test_app();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "development");
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend() {
    let app = create_test_app();

    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/auth/refresh")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_ignores_other_origins() {
    let app = create_test_app();

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_production_cookies_are_secure() {
    let config = Config {
        environment: Environment::Production,
        ..Config::test_default()
    };
    let app = create_test_app_with_config(config);

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(body_json(response).await["environment"], "production");

    app.send(common::json_request(
        "POST",
        "/auth/signup/send-otp",
        serde_json::json!({ "name": "P", "dob": "1990-01-01", "email": "p@x.com" }),
    ))
    .await;
    let code = app.notifier.last_for("p@x.com").unwrap().code;
    let response = app
        .send(common::json_request(
            "POST",
            "/auth/signup/verify-otp",
            serde_json::json!({ "name": "P", "dob": "1990-01-01", "email": "p@x.com", "otp": code }),
        ))
        .await;

    let cookie = common::set_cookie_headers(&response)
        .into_iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_test_app();

    let response = app
        .send(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
