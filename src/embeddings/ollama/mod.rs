
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, Embedding};
use crate::config::OllamaConfig;
use crate::ollama::OllamaClient;
use crate::{QaError, Result};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding backend backed by Ollama's `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig, model: &str, batch_size: usize) -> Result<Self> {
        let client = OllamaClient::new(config)?;
        Ok(Self::with_client(client, model, batch_size))
    }

    #[inline]
    pub fn with_client(client: OllamaClient, model: &str, batch_size: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbedResponse = self
            .client
            .post_json("/api/embed", &request)
            .map_err(|e| QaError::EmbeddingBackend(format!("{:#}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(QaError::EmbeddingBackend(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating embeddings for {} texts with {}",
            texts.len(),
            self.model
        );

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            results.extend(self.embed_batch(batch)?);
        }

        // Every vector from one model must share a width
        let dimension = results.first().map_or(0, Vec::len);
        if dimension == 0 || results.iter().any(|e| e.len() != dimension) {
            return Err(QaError::EmbeddingBackend(format!(
                "Model {} returned malformed embeddings",
                self.model
            )));
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            results.len(),
            dimension
        );
        Ok(results)
    }

    fn describe(&self) -> String {
        format!("ollama ({} at {})", self.model, self.client.base_url())
    }
}
