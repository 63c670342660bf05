//! Personal note model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A note owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "frontend/src/generated/")
)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(user_id: &str, note: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            note,
            created_at: Utc::now(),
        }
    }
}
