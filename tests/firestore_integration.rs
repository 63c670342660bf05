// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST). Without it they skip.

use chrono::Utc;
use otp_notes_api::db::{NoteStore, UserStore};
use otp_notes_api::models::{Note, User};

mod common;
use common::test_db;

/// Unique email per test run so emulator state never collides.
fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.test", tag, uuid::Uuid::new_v4().simple())
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_lookups() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("lookup");

    assert!(db.find_by_email(&email).await.unwrap().is_none());

    let mut user = User::new_unverified(&email, Utc::now());
    user.set_otp("123456".to_string(), Utc::now());
    db.insert_user(&user).await.unwrap();

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, email);
    assert_eq!(by_id.otp.as_ref().unwrap().code, "123456");

    let by_email = db.find_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    let google_id = format!("g-{}", user.id);
    user.google_id = Some(google_id.clone());
    user.refresh_token = Some(format!("rt-{}", user.id));
    db.update_user(&user).await.unwrap();

    let by_google = db.find_by_google_id(&google_id).await.unwrap().unwrap();
    assert_eq!(by_google.id, user.id);

    let by_token = db
        .find_by_refresh_token(user.refresh_token.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_token.id, user.id);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("dup");

    db.insert_user(&User::new_unverified(&email, Utc::now()))
        .await
        .unwrap();
    let err = db
        .insert_user(&User::new_unverified(&email, Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_clear_refresh_token_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let mut user = User::new_unverified(&unique_email("logout"), Utc::now());
    user.refresh_token = Some(format!("rt-{}", user.id));
    db.insert_user(&user).await.unwrap();

    db.clear_refresh_token(&user.id).await.unwrap();
    db.clear_refresh_token(&user.id).await.unwrap();

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());
    assert!(db
        .find_by_refresh_token(&format!("rt-{}", user.id))
        .await
        .unwrap()
        .is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// NOTE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_notes_scoped_to_owner() {
    require_emulator!();

    let db = test_db().await;
    let owner = uuid::Uuid::new_v4().to_string();
    let other = uuid::Uuid::new_v4().to_string();

    let first = Note::new(&owner, "first".to_string());
    db.create_note(&first).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = Note::new(&owner, "second".to_string());
    db.create_note(&second).await.unwrap();

    let notes = db.list_notes(&owner).await.unwrap();
    assert_eq!(
        notes.iter().map(|n| n.note.as_str()).collect::<Vec<_>>(),
        vec!["second", "first"]
    );
    assert!(db.list_notes(&other).await.unwrap().is_empty());

    let ids = vec![first.id.clone(), second.id.clone()];
    assert_eq!(db.delete_notes(&other, &ids).await.unwrap(), 0);
    assert_eq!(db.delete_notes(&owner, &ids).await.unwrap(), 2);
    assert!(db.list_notes(&owner).await.unwrap().is_empty());
}
