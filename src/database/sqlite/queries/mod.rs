
use super::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

pub struct MessageQueries;

impl MessageQueries {
    /// Append a message at the end of its thread and return the assigned sequence number.
    ///
    /// The sequence is computed inside the insert so concurrent writers cannot
    /// read the same maximum.
    #[inline]
    pub async fn append(
        conn: &mut SqliteConnection,
        message: &NewMessage,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO messages (thread_id, sequence, role, content, created_at)
            SELECT ?, COALESCE(MAX(sequence), 0) + 1, ?, ?, ?
            FROM messages WHERE thread_id = ?
            RETURNING sequence
            "#,
        )
        .bind(&message.thread_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(created_at)
        .bind(&message.thread_id)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to append message to thread {}", message.thread_id))?;

        debug!(
            "Stored {} message #{} in thread {}",
            message.role, sequence, message.thread_id
        );
        Ok(sequence)
    }

    #[inline]
    pub async fn list_by_thread(pool: &SqlitePool, thread_id: &str) -> Result<Vec<MessageRow>> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT thread_id, sequence, role, content, created_at
            FROM messages
            WHERE thread_id = ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list messages for thread {}", thread_id))
    }

    /// Distinct thread ids in ascending order
    #[inline]
    pub async fn list_threads(pool: &SqlitePool) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT DISTINCT thread_id FROM messages ORDER BY thread_id ASC")
            .fetch_all(pool)
            .await
            .context("Failed to list conversation threads")
    }
}
