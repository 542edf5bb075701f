// Embeddings module
// Content chunking plus the pluggable text-to-vector backends

pub mod chunking;
pub mod hashing;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, chunk_document, split};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use tracing::info;

use crate::config::{Config, EmbeddingBackendKind};
use crate::{QaError, Result};

/// Fixed-length vector representing the meaning of a piece of text
pub type Embedding = Vec<f32>;

/// Capability that maps text to embeddings.
///
/// Implementations must be deterministic for a fixed model configuration and
/// must not retry failed backend calls.
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single query string
    fn embed_query(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed(&[text.to_string()])?;
        if embeddings.len() != 1 {
            return Err(QaError::EmbeddingBackend(format!(
                "expected 1 embedding for a query, got {}",
                embeddings.len()
            )));
        }
        Ok(embeddings.swap_remove(0))
    }

    /// Human-readable backend description for logs and status output
    fn describe(&self) -> String;
}

/// The embedding backends selectable from configuration
#[derive(Debug, Clone)]
pub enum EmbeddingModel {
    Ollama(OllamaEmbedder),
    Hashing(HashingEmbedder),
}

impl EmbeddingModel {
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = match config.embedding.backend {
            EmbeddingBackendKind::Ollama => Self::Ollama(OllamaEmbedder::new(
                &config.ollama,
                &config.embedding.model,
                config.embedding.batch_size as usize,
            )?),
            EmbeddingBackendKind::Hashing => Self::Hashing(HashingEmbedder::new(
                config.embedding.dimension as usize,
            )?),
        };
        info!("Using embedding backend {}", model.describe());
        Ok(model)
    }
}

impl Embedder for EmbeddingModel {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        match self {
            Self::Ollama(embedder) => embedder.embed(texts),
            Self::Hashing(embedder) => embedder.embed(texts),
        }
    }

    fn embed_query(&self, text: &str) -> Result<Embedding> {
        match self {
            Self::Ollama(embedder) => embedder.embed_query(text),
            Self::Hashing(embedder) => embedder.embed_query(text),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Ollama(embedder) => embedder.describe(),
            Self::Hashing(embedder) => embedder.describe(),
        }
    }
}
