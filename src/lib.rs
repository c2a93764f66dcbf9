use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Corrupt index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Arity mismatch: {vectors} vectors, {texts} texts, {metadatas} metadata entries")]
    ArityMismatch {
        vectors: usize,
        texts: usize,
        metadatas: usize,
    },

    #[error("Entry {position} of the batch has no source path in its metadata")]
    MissingSourcePath { position: usize },

    #[error("Invalid chunking parameters: size {size}, overlap {overlap} (overlap must be smaller than size)")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("Document contains no text")]
    EmptyDocument,

    #[error("Text extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Web source {url} failed: {reason}")]
    WebSource { url: String, reason: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether the error aborts the current request (or the process at startup).
    ///
    /// Per-source web failures are absorbed by the answer pipeline.
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::WebSource { .. })
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod indexer;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod service;
pub mod web;

#[cfg(test)]
mod test_support;
