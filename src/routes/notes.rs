// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Personal notes. Every route is scoped to the authenticated user.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::{require_auth, AuthUser};
use crate::models::Note;
use crate::routes::auth::MessageResponse;
use crate::routes::extract::ValidatedJson;
use crate::AppState;

/// Longest note accepted, in characters.
pub const MAX_NOTE_LEN: usize = 10_000;

/// Most IDs accepted by one delete request.
pub const MAX_DELETE_IDS: usize = 100;

pub fn routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/notes/create", post(create_note))
        .route("/notes/fetch", get(fetch_notes))
        .route("/notes/delete", delete(delete_notes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(custom(function = "validate_note"))]
    pub note: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteNotesRequest {
    #[validate(custom(function = "validate_ids"))]
    pub ids: Vec<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct NotesResponse {
    pub message: String,
    pub body: Vec<Note>,
}

fn validate_note(note: &str) -> std::result::Result<(), ValidationError> {
    if note.trim().is_empty() {
        return Err(ValidationError::new("note").with_message("Note cannot be empty".into()));
    }
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::new("note").with_message(
            format!("Note must be at most {} characters", MAX_NOTE_LEN).into(),
        ));
    }
    Ok(())
}

fn validate_ids(ids: &[String]) -> std::result::Result<(), ValidationError> {
    if ids.is_empty() || ids.len() > MAX_DELETE_IDS {
        return Err(ValidationError::new("ids").with_message(
            format!("Provide between 1 and {} note IDs", MAX_DELETE_IDS).into(),
        ));
    }
    Ok(())
}

async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser { user }): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let note = Note::new(&user.id, body.note);
    state.notes.create_note(&note).await?;

    tracing::debug!(user_id = %user.id, note_id = %note.id, "Note created");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Note created successfully")),
    ))
}

async fn fetch_notes(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser { user }): Extension<AuthUser>,
) -> Result<Json<NotesResponse>> {
    let notes = state.notes.list_notes(&user.id).await?;

    Ok(Json(NotesResponse {
        message: "Fetched notes successfully".to_string(),
        body: notes,
    }))
}

async fn delete_notes(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser { user }): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<DeleteNotesRequest>,
) -> Result<Json<MessageResponse>> {
    let deleted = state.notes.delete_notes(&user.id, &body.ids).await?;

    if deleted == 0 {
        return Err(AppError::NotFound("No notes found to delete".to_string()));
    }

    tracing::info!(user_id = %user.id, deleted, "Notes deleted");

    Ok(Json(MessageResponse::new(format!(
        "{} note(s) deleted successfully",
        deleted
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_length_limit() {
        assert!(validate_note("hello").is_ok());
        assert!(validate_note(" \n ").is_err());
        assert!(validate_note(&"é".repeat(MAX_NOTE_LEN)).is_ok());
        assert!(validate_note(&"é".repeat(MAX_NOTE_LEN + 1)).is_err());
    }

    #[test]
    fn test_delete_ids_bounds() {
        let empty = DeleteNotesRequest { ids: vec![] };
        assert!(empty.validate().is_err());

        let too_many = DeleteNotesRequest {
            ids: (0..=MAX_DELETE_IDS).map(|i| i.to_string()).collect(),
        };
        assert!(too_many.validate().is_err());

        let ok = DeleteNotesRequest {
            ids: vec!["a".to_string()],
        };
        assert!(ok.validate().is_ok());

        let full = DeleteNotesRequest {
            ids: (0..MAX_DELETE_IDS).map(|i| i.to_string()).collect(),
        };
        assert!(full.validate().is_ok());
    }

    #[test]
    fn test_limit_messages_follow_constants() {
        let err = validate_ids(&[]).unwrap_err();
        assert_eq!(
            err.message.as_deref(),
            Some(format!("Provide between 1 and {} note IDs", MAX_DELETE_IDS).as_str())
        );

        let err = validate_note(&"x".repeat(MAX_NOTE_LEN + 1)).unwrap_err();
        assert_eq!(
            err.message.as_deref(),
            Some(format!("Note must be at most {} characters", MAX_NOTE_LEN).as_str())
        );
    }
}
