
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored conversation message as it appears in the `messages` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    pub thread_id: String,
    pub sequence: i64,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub thread_id: String,
    pub role: String,
    pub content: String,
}

impl NewMessage {
    #[inline]
    pub fn new(thread_id: &str, role: &str, content: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}
