// Retriever module
// Embeds a query and ranks corpus entries against it


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::{Metadata, PATH_KEY, SharedVectorStore};
use crate::embeddings::Embedder;
use crate::prompt::truncate_chars;
use crate::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of lecture excerpts retrieved when the caller does not specify one
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self { default_k: 4 }
    }
}

/// A ranked lecture excerpt
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk text, truncated to the display budget
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl RetrievedChunk {
    #[inline]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(PATH_KEY).map(String::as_str)
    }
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<SharedVectorStore>,
    excerpt_chars: usize,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<SharedVectorStore>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            excerpt_chars,
        }
    }

    /// Top `k` chunks for `query`, best first, each truncated to the excerpt budget.
    ///
    /// The index keeps full chunk text; truncation only affects what is returned.
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(RagError::Embedding(format!(
                "expected one query vector, embedder returned {}",
                vectors.len()
            )));
        }
        let query_vector = vectors.remove(0);

        let results = self.store.search(&query_vector, k).await?;
        debug!("Retrieved {} of k={} chunks", results.len(), k);

        Ok(results
            .into_iter()
            .map(|result| RetrievedChunk {
                text: truncate_chars(&result.entry.text, self.excerpt_chars).to_string(),
                metadata: result.entry.metadata,
                score: result.score,
            })
            .collect())
    }
}
