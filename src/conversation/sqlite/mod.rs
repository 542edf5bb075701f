#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ConversationStore, Message, Role};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{MessageRow, NewMessage};
use crate::database::sqlite::queries::MessageQueries;
use crate::{QaError, Result};

/// Conversation store persisted in SQLite.
///
/// History survives process restarts, so a thread can be resumed by id.
#[derive(Debug)]
pub struct SqliteConversationStore {
    database: Database,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn storage_error(error: anyhow::Error) -> QaError {
    QaError::Storage(format!("{:#}", error))
}

impl SqliteConversationStore {
    #[inline]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Open (or create) the conversation database inside `data_dir`
    #[inline]
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let database = Database::initialize_from_config_dir(data_dir)
            .await
            .map_err(storage_error)?;
        info!("Opened conversation store in {}", data_dir.display());
        Ok(Self::new(database))
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn thread_lock(&self, thread_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| QaError::Storage("thread lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(thread_id.to_string()).or_default()))
    }
}

fn to_message(row: MessageRow) -> Result<Message> {
    let sequence = u64::try_from(row.sequence).map_err(|_| {
        QaError::Storage(format!(
            "Invalid sequence {} in thread {}",
            row.sequence, row.thread_id
        ))
    })?;

    Ok(Message {
        role: row.role.parse()?,
        content: row.content,
        sequence,
        created_at: row.created_at,
    })
}

fn stored_message(role: Role, content: &str, sequence: i64, created_at: DateTime<Utc>) -> Message {
    Message {
        role,
        content: content.to_string(),
        sequence: sequence.unsigned_abs(),
        created_at,
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message> {
        let lock = self.thread_lock(thread_id)?;
        let _guard = lock.lock().await;

        let created_at = Utc::now();
        let mut conn = self
            .database
            .pool()
            .acquire()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to acquire connection: {}", e)))?;

        let sequence = MessageQueries::append(
            &mut conn,
            &NewMessage::new(thread_id, role.as_str(), content),
            created_at,
        )
        .await
        .map_err(storage_error)?;

        Ok(stored_message(role, content, sequence, created_at))
    }

    async fn append_exchange(
        &self,
        thread_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<(Message, Message)> {
        let lock = self.thread_lock(thread_id)?;
        let _guard = lock.lock().await;

        let created_at = Utc::now();
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let user_sequence = MessageQueries::append(
            &mut tx,
            &NewMessage::new(thread_id, Role::User.as_str(), question),
            created_at,
        )
        .await
        .map_err(storage_error)?;

        let assistant_sequence = MessageQueries::append(
            &mut tx,
            &NewMessage::new(thread_id, Role::Assistant.as_str(), answer),
            created_at,
        )
        .await
        .map_err(storage_error)?;

        // Dropping the transaction before this point rolls both inserts back
        tx.commit()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to commit exchange: {}", e)))?;

        debug!(
            "Committed exchange #{}-#{} to {}",
            user_sequence, assistant_sequence, thread_id
        );

        Ok((
            stored_message(Role::User, question, user_sequence, created_at),
            stored_message(Role::Assistant, answer, assistant_sequence, created_at),
        ))
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Message>> {
        MessageQueries::list_by_thread(self.database.pool(), thread_id)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(to_message)
            .collect()
    }

    async fn threads(&self) -> Result<Vec<String>> {
        MessageQueries::list_threads(self.database.pool())
            .await
            .map_err(storage_error)
    }
}
