
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::embeddings::{Chunk, Embedding};
use crate::{QaError, Result};

const INDEX_FORMAT: &str = "docqa-vector-index";
const INDEX_VERSION: u32 = 1;
const INDEX_METRIC: &str = "cosine";

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// Result of a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]`
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    pub dimension: usize,
    pub documents: Vec<String>,
}

/// In-memory exact nearest-neighbour index using cosine similarity.
///
/// The dimension is fixed when the index is created. Entries are only ever
/// appended; search ties are broken by insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format: &'a str,
    version: u32,
    metric: &'a str,
    dimension: usize,
    entry_count: usize,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    format: String,
    version: u32,
    metric: String,
    dimension: usize,
    entry_count: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components
    #[inline]
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(QaError::InvalidConfig(
                "index dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            entries: Vec::new(),
            norms: Vec::new(),
        })
    }

    /// Build an index from scratch, taking the dimension from the first entry
    #[inline]
    pub fn build(entries: Vec<(Chunk, Embedding)>) -> Result<Self> {
        let dimension = entries
            .first()
            .map(|(_, embedding)| embedding.len())
            .ok_or(QaError::EmptyIndex)?;

        let mut index = Self::with_dimension(dimension)?;
        index.extend(entries)?;

        info!(
            "Built vector index with {} entries of dimension {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        let documents: BTreeSet<&str> = self
            .entries
            .iter()
            .map(|entry| entry.chunk.source_doc_id.as_str())
            .collect();

        IndexStats {
            entries: self.len(),
            dimension: self.dimension,
            documents: documents.into_iter().map(str::to_string).collect(),
        }
    }

    /// Append a single entry
    #[inline]
    pub fn insert(&mut self, chunk: Chunk, embedding: Embedding) -> Result<()> {
        self.check_dimension(&embedding)?;
        self.norms.push(norm(&embedding));
        self.entries.push(IndexEntry { chunk, embedding });
        Ok(())
    }

    /// Append many entries. Nothing is inserted if any embedding has the wrong dimension.
    #[inline]
    pub fn extend(&mut self, entries: Vec<(Chunk, Embedding)>) -> Result<()> {
        for (_, embedding) in &entries {
            self.check_dimension(embedding)?;
        }

        self.entries.reserve(entries.len());
        self.norms.reserve(entries.len());
        for (chunk, embedding) in entries {
            self.norms.push(norm(&embedding));
            self.entries.push(IndexEntry { chunk, embedding });
        }
        Ok(())
    }

    /// Return up to `k` entries ordered by descending cosine similarity to `query`
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(QaError::InvalidConfig(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.is_empty() {
            return Err(QaError::EmptyIndex);
        }
        self.check_dimension(query)?;

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(position, (entry, entry_norm))| {
                (
                    position,
                    cosine_from_parts(dot(query, &entry.embedding), query_norm, *entry_norm),
                )
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!(
            "Vector search returned {} of {} entries (k = {})",
            scored.len(),
            self.len(),
            k
        );

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Persist the index as a self-describing JSON document.
    ///
    /// The file is written to a uniquely named temporary file next to `path`
    /// and renamed into place, so readers never see a partial index.
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = IndexFileRef {
            format: INDEX_FORMAT,
            version: INDEX_VERSION,
            metric: INDEX_METRIC,
            dimension: self.dimension,
            entry_count: self.entries.len(),
            entries: &self.entries,
        };

        let contents = serde_json::to_vec(&file)
            .map_err(|e| QaError::Storage(format!("Failed to serialize index: {}", e)))?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&contents)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        info!(
            "Saved vector index with {} entries to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Load an index written by [`VectorIndex::save`]
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read(path)?;
        let file: IndexFile = serde_json::from_slice(&contents).map_err(|e| {
            QaError::Storage(format!("Failed to parse index {}: {}", path.display(), e))
        })?;

        if file.format != INDEX_FORMAT {
            return Err(QaError::Storage(format!(
                "{} is not a vector index (format '{}')",
                path.display(),
                file.format
            )));
        }
        if file.version != INDEX_VERSION {
            return Err(QaError::Storage(format!(
                "Unsupported index version {} (expected {})",
                file.version, INDEX_VERSION
            )));
        }
        if file.metric != INDEX_METRIC {
            return Err(QaError::Storage(format!(
                "Unsupported similarity metric '{}'",
                file.metric
            )));
        }
        if file.entry_count != file.entries.len() {
            return Err(QaError::Storage(format!(
                "Index header declares {} entries but {} are present",
                file.entry_count,
                file.entries.len()
            )));
        }

        let mut index = Self::with_dimension(file.dimension)
            .map_err(|e| QaError::Storage(format!("Corrupt index header: {}", e)))?;
        index
            .extend(
                file.entries
                    .into_iter()
                    .map(|entry| (entry.chunk, entry.embedding))
                    .collect(),
            )
            .map_err(|e| QaError::Storage(format!("Corrupt index entry: {}", e)))?;

        info!(
            "Loaded vector index with {} entries from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(QaError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            })
        }
    }
}

fn cosine_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
