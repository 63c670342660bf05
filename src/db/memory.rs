// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by `DashMap`.
//!
//! Used by the test suite and for local runs without `GCP_PROJECT_ID`.
//! Secondary lookups scan the map; fine for the sizes it is meant for.

use crate::db::{NoteStore, UserStore};
use crate::error::AppError;
use crate::models::{Note, User};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// In-memory database. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    notes: Arc<DashMap<String, Note>>,
    // Serializes inserts so the uniqueness check and the write are one step.
    insert_lock: Arc<Mutex<()>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_user(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|u| u.email == email))
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|u| u.google_id.as_deref() == Some(google_id)))
    }

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|u| u.refresh_token.as_deref() == Some(token)))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let _guard = self
            .insert_lock
            .lock()
            .map_err(|_| AppError::Database("insert lock poisoned".to_string()))?;

        if self.find_user(|u| u.email == user.email).is_some() {
            return Err(AppError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        if let Some(google_id) = user.google_id.as_deref() {
            if self
                .find_user(|u| u.google_id.as_deref() == Some(google_id))
                .is_some()
            {
                return Err(AppError::Conflict("Google account already linked".to_string()));
            }
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AppError> {
        match self.users.get_mut(&user.id) {
            Some(mut existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {} not found", user.id))),
        }
    }

    async fn clear_refresh_token(&self, id: &str) -> Result<(), AppError> {
        match self.users.get_mut(id) {
            Some(mut user) => {
                if user.refresh_token.take().is_some() {
                    user.updated_at = chrono::Utc::now();
                }
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {} not found", id))),
        }
    }
}

#[async_trait]
impl NoteStore for MemoryDb {
    async fn create_note(&self, note: &Note) -> Result<(), AppError> {
        self.notes.insert(note.id.clone(), note.clone());
        Ok(())
    }

    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, AppError> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<usize, AppError> {
        let deleted = ids
            .iter()
            .filter(|id| {
                self.notes
                    .remove_if(id.as_str(), |_, note| note.user_id == user_id)
                    .is_some()
            })
            .count();
        Ok(deleted)
    }
}
