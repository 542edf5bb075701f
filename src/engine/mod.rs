// Answer engine
// Retrieval, prompt assembly and generation behind a single "ask" operation

#[cfg(test)]
mod tests;

use itertools::Itertools;
use tracing::{debug, info};

use crate::conversation::{ConversationStore, Message};
use crate::database::{SearchHit, VectorIndex};
use crate::embeddings::Embedder;
use crate::generation::{GenerationRequest, Generator};
use crate::{QaError, Result};

/// Separator placed between retrieved chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Stateless orchestrator borrowing its capabilities for the duration of a call
pub struct AnswerEngine<'a> {
    embedder: &'a dyn Embedder,
    generator: &'a dyn Generator,
    conversations: &'a dyn ConversationStore,
}

/// Join retrieved chunk texts, best match first
#[inline]
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .join(CONTEXT_SEPARATOR)
}

impl<'a> AnswerEngine<'a> {
    #[inline]
    pub fn new(
        embedder: &'a dyn Embedder,
        generator: &'a dyn Generator,
        conversations: &'a dyn ConversationStore,
    ) -> Self {
        Self {
            embedder,
            generator,
            conversations,
        }
    }

    /// Answer `question` on `thread_id` using the `k` best chunks of `index`.
    ///
    /// History is only extended once an answer exists, and then by the full
    /// question/answer pair.
    #[inline]
    pub async fn answer(
        &self,
        thread_id: &str,
        question: &str,
        index: Option<&VectorIndex>,
        k: usize,
    ) -> Result<Message> {
        if question.trim().is_empty() {
            return Err(QaError::InvalidConfig(
                "question must not be empty".to_string(),
            ));
        }

        let index = index
            .filter(|index| !index.is_empty())
            .ok_or(QaError::NoDocumentLoaded)?;

        let query = self.embedder.embed_query(question)?;
        let hits = index.search(&query, k)?;
        debug!(
            "Retrieved {} chunks for thread {} (best score {:.3})",
            hits.len(),
            thread_id,
            hits.first().map_or(0.0, |hit| hit.score)
        );

        let history = self.conversations.history(thread_id).await?;
        let request = GenerationRequest::new(build_context(&hits), history, question);

        let reply = self.generator.generate(&request)?;

        let (_, answer) = self
            .conversations
            .append_exchange(thread_id, question, &reply)
            .await?;

        info!(
            "Answered question on thread {} (message #{})",
            thread_id, answer.sequence
        );
        Ok(answer)
    }
}
