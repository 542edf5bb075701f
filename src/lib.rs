use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("The vector index has no entries")]
    EmptyIndex,

    #[error("No document has been loaded yet")]
    NoDocumentLoaded,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod conversation;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod engine;
pub mod evaluation;
pub mod generation;
pub mod ollama;
pub mod service;
