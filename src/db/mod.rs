//! Database layer: store traits plus Firestore and in-memory backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Note, User};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const NOTES: &str = "notes";
}

/// Persistent user records.
///
/// Callers normalize emails before every lookup; stores compare verbatim.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_refresh_token(&self, token: &str) -> Result<Option<User>, AppError>;

    /// Create a user. Fails with `Conflict` if the email or Google ID is taken
    /// and the backend can tell.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    /// Overwrite an existing user record.
    async fn update_user(&self, user: &User) -> Result<(), AppError>;

    /// Drop the user's refresh token. Clearing an already empty token is Ok.
    async fn clear_refresh_token(&self, id: &str) -> Result<(), AppError>;
}

/// Ownership-scoped personal notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, note: &Note) -> Result<(), AppError>;

    /// Notes owned by `user_id`, newest first.
    async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, AppError>;

    /// Delete the listed notes that belong to `user_id`; returns how many went.
    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<usize, AppError>;
}
