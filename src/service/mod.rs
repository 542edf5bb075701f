// Question-answering service
// Owns the active index snapshot and wires the capabilities together


use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::conversation::{ConversationStore, Message, SqliteConversationStore};
use crate::database::{IndexStats, VectorIndex};
use crate::document::Document;
use crate::embeddings::{ChunkingConfig, Embedder, EmbeddingModel, chunk_document};
use crate::engine::AnswerEngine;
use crate::generation::{GenerationModel, Generator};
use crate::{QaError, Result};

/// Outcome of a successful ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks: usize,
    pub dimension: usize,
    /// Whether the index was written to disk
    pub persisted: bool,
}

/// Public entry point: ingest a document, then ask questions about it.
///
/// The active index is replaced as a whole on every ingest; concurrent
/// questions keep using the snapshot they started with. Ingests run one at a
/// time so the saved index always matches the active one.
pub struct QaService {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    conversations: Arc<dyn ConversationStore>,
    chunking: ChunkingConfig,
    top_k: usize,
    index: RwLock<Option<Arc<VectorIndex>>>,
    index_path: Option<PathBuf>,
    /// Held by whoever is building, saving or swapping the index
    writer: Mutex<()>,
}

impl QaService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        conversations: Arc<dyn ConversationStore>,
        chunking: ChunkingConfig,
        top_k: usize,
    ) -> Result<Self> {
        chunking.validate()?;
        if top_k == 0 {
            return Err(QaError::InvalidConfig(
                "top_k must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            generator,
            conversations,
            chunking,
            top_k,
            index: RwLock::new(None),
            index_path: None,
            writer: Mutex::new(()),
        })
    }

    /// Persist every successfully built index to `path`
    #[inline]
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Build a service from configuration, with a SQLite conversation store
    /// and index file inside the data directory
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let embedder = EmbeddingModel::from_config(config)?;
        let generator = GenerationModel::from_config(config)?;
        let conversations = SqliteConversationStore::open(config.get_base_dir()).await?;

        let service = Self::new(
            Arc::new(embedder),
            Arc::new(generator),
            Arc::new(conversations),
            config.chunking.clone(),
            config.retrieval.top_k,
        )?
        .with_index_path(config.index_path());

        Ok(service)
    }

    #[inline]
    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    #[inline]
    pub fn conversations(&self) -> &dyn ConversationStore {
        self.conversations.as_ref()
    }

    /// Chunk, embed and index `document`, replacing the active index.
    ///
    /// The previous index stays active if any step fails, including the save.
    #[inline]
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        if document.is_blank() {
            return Err(QaError::EmptyIndex);
        }

        let _writer = self.writer.lock().await;
        let chunks = chunk_document(document, &self.chunking)?;
        info!(
            "Ingesting '{}': {} characters into {} chunks",
            document.id,
            document.char_count(),
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts)?;
        if embeddings.len() != chunks.len() {
            return Err(QaError::EmbeddingBackend(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let index = VectorIndex::build(chunks.into_iter().zip(embeddings).collect())?;

        let persisted = match &self.index_path {
            Some(path) => {
                index.save(path)?;
                true
            }
            None => false,
        };

        let report = IngestReport {
            doc_id: document.id.clone(),
            chunks: index.len(),
            dimension: index.dimension(),
            persisted,
        };

        *self.index.write().await = Some(Arc::new(index));
        info!(
            "Active index now holds {} chunks of '{}'",
            report.chunks, report.doc_id
        );

        Ok(report)
    }

    /// Answer `question` on `thread_id` against the active index
    #[inline]
    pub async fn ask(&self, thread_id: &str, question: &str) -> Result<Message> {
        let snapshot = self.active_index().await;
        debug!(
            "Asking on thread {} with {} indexed chunks",
            thread_id,
            snapshot.as_ref().map_or(0, |index| index.len())
        );

        AnswerEngine::new(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            self.conversations.as_ref(),
        )
        .answer(thread_id, question, snapshot.as_deref(), self.top_k)
        .await
    }

    #[inline]
    pub async fn history(&self, thread_id: &str) -> Result<Vec<Message>> {
        self.conversations.history(thread_id).await
    }

    #[inline]
    pub async fn threads(&self) -> Result<Vec<String>> {
        self.conversations.threads().await
    }

    /// Activate the index saved by a previous ingest, if there is one.
    ///
    /// Returns `None` when no index path is configured or no file exists yet.
    #[inline]
    pub async fn load_persisted_index(&self) -> Result<Option<IndexStats>> {
        let Some(path) = self.index_path.as_deref() else {
            return Ok(None);
        };
        if !path.exists() {
            debug!("No persisted index at {}", path.display());
            return Ok(None);
        }

        let _writer = self.writer.lock().await;
        let index = VectorIndex::load(path).inspect_err(|e| {
            warn!("Persisted index at {} is unusable: {}", path.display(), e);
        })?;
        let stats = index.stats();

        *self.index.write().await = Some(Arc::new(index));
        Ok(Some(stats))
    }

    /// Statistics of the active index, if any
    #[inline]
    pub async fn index_stats(&self) -> Option<IndexStats> {
        self.active_index().await.map(|index| index.stats())
    }

    /// The index questions are currently answered against
    #[inline]
    pub async fn active_index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }
}
