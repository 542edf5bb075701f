
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Document, DocumentSegment};
use crate::{QaError, Result};

/// A contiguous slice of document text stored as a retrievable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Character offset of the first character in the source document
    pub source_offset: usize,
    /// Identifier of the document this chunk came from
    pub source_doc_id: String,
    /// Position of this chunk in the chunker output
    pub chunk_index: usize,
}

/// Configuration for fixed-window chunking.
///
/// Sizes are measured in characters (Unicode scalar values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(QaError::InvalidConfig(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(QaError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows
    #[inline]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Chunk every segment of a document
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    split(&document.segments, &document.id, config)
}

/// Split ordered document segments into overlapping fixed-size chunks.
///
/// Segments are concatenated without a separator. Windows of `chunk_size`
/// characters advance by `chunk_size - overlap`; once the text left from the
/// current start fits in one window it becomes the final, possibly shorter,
/// chunk. Empty input yields no chunks.
#[inline]
pub fn split(
    segments: &[DocumentSegment],
    doc_id: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chars: Vec<char> = Vec::new();
    // (position in `chars`, offset in the source document)
    let mut segment_starts: Vec<(usize, usize)> = Vec::with_capacity(segments.len());

    for segment in segments {
        if segment.text.is_empty() {
            continue;
        }
        segment_starts.push((chars.len(), segment.offset));
        chars.extend(segment.text.chars());
    }

    if chars.is_empty() {
        debug!("Document '{}' has no text to chunk", doc_id);
        return Ok(Vec::new());
    }

    let stride = config.stride();
    let mut chunks = Vec::with_capacity(chars.len() / stride + 1);
    let mut start = 0;

    loop {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(Chunk {
            text: chars[start..end].iter().collect(),
            source_offset: source_offset(&segment_starts, start),
            source_doc_id: doc_id.to_string(),
            chunk_index: chunks.len(),
        });

        if end == chars.len() {
            break;
        }
        start += stride;
    }

    debug!(
        "Chunked document '{}' ({} characters) into {} chunks of up to {} characters",
        doc_id,
        chars.len(),
        chunks.len(),
        config.chunk_size
    );

    Ok(chunks)
}

fn source_offset(segment_starts: &[(usize, usize)], position: usize) -> usize {
    let index = segment_starts
        .partition_point(|(start, _)| *start <= position)
        .saturating_sub(1);
    segment_starts
        .get(index)
        .map_or(position, |(start, offset)| offset + (position - start))
}
