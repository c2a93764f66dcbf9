// Database module
// Durable vector index and its single-writer wrapper

pub mod shared;
pub mod vector_store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use shared::{IndexStats, SharedVectorStore};
pub use vector_store::{SearchResult, VectorStore};

/// Metadata stored alongside each entry; always carries at least [`PATH_KEY`]
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the source document path
pub const PATH_KEY: &str = "path";
/// Metadata key holding the chunk position within its document
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the RFC 3339 ingestion timestamp
pub const INGESTED_AT_KEY: &str = "ingested_at";

/// A single (vector, text, metadata) triple owned by the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

impl IndexEntry {
    /// Source document path, if recorded
    #[inline]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(PATH_KEY).map(String::as_str)
    }
}
