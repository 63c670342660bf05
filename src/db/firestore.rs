// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, looked up by id, email, Google ID or refresh token)
//! - Notes (ownership-scoped personal notes)
//!
//! Firestore has no unique indexes, so email and Google ID uniqueness rest on
//! the lookup that precedes every insert. Two racing sign-ups for the same
//! email can both pass that lookup; the later write wins.

use crate::db::{collections, NoteStore, UserStore};
use crate::error::AppError;
use crate::models::{Note, User};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// First user whose `field` equals `value`.
    async fn find_user_by(&self, field: &'static str, value: &str) -> Result<Option<User>, AppError> {
        let value = value.to_string();
        let users: Vec<User> = self
            .client
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    async fn write_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, doc_ids: &[String], collection: &str) -> Result<(), AppError> {
        for chunk in doc_ids.chunks(BATCH_SIZE) {
            let mut transaction = self
                .client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                self.client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl UserStore for FirestoreDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_user_by("email", email).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        self.find_user_by("google_id", google_id).await
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError> {
        self.find_user_by("refresh_token", token).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        if let Some(google_id) = user.google_id.as_deref() {
            if self.find_by_google_id(google_id).await?.is_some() {
                return Err(AppError::Conflict("Google account already linked".to_string()));
            }
        }

        self.write_user(user).await?;
        tracing::debug!(user_id = %user.id, "User created");
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.write_user(user).await
    }

    async fn clear_refresh_token(&self, id: &str) -> Result<(), AppError> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if user.refresh_token.take().is_none() {
            return Ok(());
        }
        user.updated_at = chrono::Utc::now();
        self.write_user(&user).await
    }
}

#[async_trait]
impl NoteStore for FirestoreDb {
    async fn create_note(&self, note: &Note) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::NOTES)
            .document_id(&note.id)
            .object(note)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, AppError> {
        let user_id = user_id.to_string();
        let mut notes: Vec<Note> = self
            .client
            .fluent()
            .select()
            .from(collections::NOTES)
            .filter(move |q| q.for_all([q.field("userId").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Timestamps are stored as strings; order on the parsed values.
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<usize, AppError> {
        let client = &self.client;
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let owned: Vec<String> = stream::iter(ids)
            .map(|id| async move {
                let note: Option<Note> = client
                    .fluent()
                    .select()
                    .by_id_in(collections::NOTES)
                    .obj()
                    .one(&id)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok::<_, AppError>(note.filter(|n| n.user_id == user_id).map(|n| n.id))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<String>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<String>>, AppError>>()?
            .into_iter()
            .flatten()
            .collect();

        self.batch_delete(&owned, collections::NOTES).await?;
        tracing::debug!(user_id, count = owned.len(), "Deleted notes");

        Ok(owned.len())
    }
}
