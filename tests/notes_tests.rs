// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notes API tests: ownership scoping and input limits.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{authed_request, body_json, create_test_app, TestApp};

async fn signed_in(app: &TestApp, email: &str) -> String {
    let (body, _) = app.sign_up("Note Taker", "1990-01-01", email).await;
    body["accessToken"].as_str().unwrap().to_string()
}

async fn create(app: &TestApp, token: &str, note: &str) -> StatusCode {
    app.send(authed_request(
        "POST",
        "/notes/create",
        token,
        Some(json!({ "note": note })),
    ))
    .await
    .status()
}

async fn fetch(app: &TestApp, token: &str) -> Vec<Value> {
    let response = app
        .send(authed_request("GET", "/notes/fetch", token, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Fetched notes successfully");
    body["body"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_create_and_fetch_newest_first() {
    let app = create_test_app();
    let token = signed_in(&app, "alice@x.com").await;

    assert_eq!(create(&app, &token, "first").await, StatusCode::CREATED);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(create(&app, &token, "second").await, StatusCode::CREATED);

    let notes = fetch(&app, &token).await;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["note"], "second");
    assert_eq!(notes[1]["note"], "first");
    assert!(notes[0]["userId"].is_string());
    assert!(notes[0]["createdAt"].is_string());
}

#[tokio::test]
async fn test_notes_are_private() {
    let app = create_test_app();
    let alice = signed_in(&app, "alice@x.com").await;
    let bob = signed_in(&app, "bob@x.com").await;

    create(&app, &alice, "alice's secret").await;

    assert!(fetch(&app, &bob).await.is_empty());

    let alice_note_id = fetch(&app, &alice).await[0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Bob cannot delete Alice's note.
    let response = app
        .send(authed_request(
            "DELETE",
            "/notes/delete",
            &bob,
            Some(json!({ "ids": [alice_note_id] })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(fetch(&app, &alice).await.len(), 1);
}

#[tokio::test]
async fn test_delete_reports_count() {
    let app = create_test_app();
    let token = signed_in(&app, "alice@x.com").await;

    for note in ["a", "b", "c"] {
        create(&app, &token, note).await;
    }
    let ids: Vec<String> = fetch(&app, &token)
        .await
        .iter()
        .take(2)
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect();

    let response = app
        .send(authed_request(
            "DELETE",
            "/notes/delete",
            &token,
            Some(json!({ "ids": [ids[0], ids[1], "missing-id"] })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "2 note(s) deleted successfully"
    );
    assert_eq!(fetch(&app, &token).await.len(), 1);
}

#[tokio::test]
async fn test_note_validation() {
    let app = create_test_app();
    let token = signed_in(&app, "alice@x.com").await;

    assert_eq!(create(&app, &token, "").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        create(&app, &token, &"x".repeat(10_001)).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        create(&app, &token, &"x".repeat(10_000)).await,
        StatusCode::CREATED
    );

    let response = app
        .send(authed_request(
            "DELETE",
            "/notes/delete",
            &token,
            Some(json!({ "ids": [] })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notes_require_auth() {
    let app = create_test_app();

    let response = app
        .send(
            axum::http::Request::builder()
                .uri("/notes/fetch")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
