// Document ingestion boundary
// Turns plain text into ordered (text, offset) segments for the chunker


use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{QaError, Result};

/// Page separator emitted by most PDF-to-text converters
pub const PAGE_BREAK: char = '\x0c';

/// A contiguous piece of document text and its character offset in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSegment {
    pub text: String,
    pub offset: usize,
}

/// A document ready for chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub segments: Vec<DocumentSegment>,
}

impl Document {
    /// Create a single-segment document starting at offset 0
    #[inline]
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            segments: vec![DocumentSegment {
                text: text.into(),
                offset: 0,
            }],
        }
    }

    /// Split `text` into one segment per page, using form feeds as page breaks.
    ///
    /// The page break characters are dropped; segment offsets still refer to
    /// character positions in the original text.
    #[inline]
    pub fn from_paged_text(id: impl Into<String>, text: &str) -> Self {
        let mut segments = Vec::new();
        let mut offset = 0;

        for page in text.split(PAGE_BREAK) {
            let length = page.chars().count();
            if !page.is_empty() {
                segments.push(DocumentSegment {
                    text: page.to_string(),
                    offset,
                });
            }
            offset += length + 1;
        }

        Self {
            id: id.into(),
            segments,
        }
    }

    /// Total length in characters across all segments
    #[inline]
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }
}

/// Load a UTF-8 text file as a paged document.
///
/// The document id defaults to the file name.
#[inline]
pub fn load_text_file(path: &Path, doc_id: Option<String>) -> Result<Document> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| {
        QaError::InvalidConfig(format!(
            "{} is not valid UTF-8 text; convert it to plain text first",
            path.display()
        ))
    })?;

    let id = doc_id.unwrap_or_else(|| {
        path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    });

    let document = Document::from_paged_text(id, &text);
    debug!(
        "Loaded document '{}' with {} segments ({} characters)",
        document.id,
        document.segments.len(),
        document.char_count()
    );

    Ok(document)
}
