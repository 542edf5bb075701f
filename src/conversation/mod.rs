// Conversation state
// Append-only, per-thread message logs with in-memory and SQLite stores

pub mod sqlite;


pub use sqlite::SqliteConversationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{QaError, Result};

/// Thread used when the caller does not name one
pub const DEFAULT_THREAD_ID: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(QaError::Storage(format!("Unknown message role '{}'", other))),
        }
    }
}

/// One turn of a conversation.
///
/// `sequence` starts at 1 and increases by one per message within a thread;
/// ordering is always by sequence, `created_at` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Storage for per-thread conversation history.
///
/// Appends to one thread are serialized; different threads never contend.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a single message and return it with its assigned sequence
    async fn append_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message>;

    /// Append a user question and the assistant answer as one adjacent pair.
    ///
    /// Either both messages are stored or neither is.
    async fn append_exchange(
        &self,
        thread_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<(Message, Message)>;

    /// Messages of `thread_id` in insertion order; empty for an unknown thread
    async fn history(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// Known thread ids, sorted
    async fn threads(&self) -> Result<Vec<String>>;
}

type ThreadLog = Arc<Mutex<Vec<Message>>>;

/// Process-local store; history is lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    threads: std::sync::Mutex<HashMap<String, ThreadLog>>,
}

impl InMemoryConversationStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn thread(&self, thread_id: &str) -> Result<ThreadLog> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|_| QaError::Storage("conversation map lock poisoned".to_string()))?;
        Ok(Arc::clone(threads.entry(thread_id.to_string()).or_default()))
    }

    fn existing_thread(&self, thread_id: &str) -> Result<Option<ThreadLog>> {
        let threads = self
            .threads
            .lock()
            .map_err(|_| QaError::Storage("conversation map lock poisoned".to_string()))?;
        Ok(threads.get(thread_id).cloned())
    }
}

fn next_message(log: &[Message], role: Role, content: &str) -> Message {
    Message {
        role,
        content: content.to_string(),
        sequence: log.last().map_or(1, |last| last.sequence + 1),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message> {
        let thread = self.thread(thread_id)?;
        let mut log = thread.lock().await;

        let message = next_message(&log, role, content);
        log.push(message.clone());
        debug!("Appended {} message #{} to {}", role, message.sequence, thread_id);

        Ok(message)
    }

    async fn append_exchange(
        &self,
        thread_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<(Message, Message)> {
        let thread = self.thread(thread_id)?;
        let mut log = thread.lock().await;

        let user = next_message(&log, Role::User, question);
        log.push(user.clone());
        let assistant = next_message(&log, Role::Assistant, answer);
        log.push(assistant.clone());

        debug!(
            "Appended exchange #{}-#{} to {}",
            user.sequence, assistant.sequence, thread_id
        );
        Ok((user, assistant))
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Message>> {
        match self.existing_thread(thread_id)? {
            Some(thread) => Ok(thread.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn threads(&self) -> Result<Vec<String>> {
        let threads = self
            .threads
            .lock()
            .map_err(|_| QaError::Storage("conversation map lock poisoned".to_string()))?;

        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
