#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinError;
use tracing::{error, info};

use super::{Metadata, SearchResult, VectorStore};
use crate::{RagError, Result};

/// Single owner of the corpus for a process.
///
/// Searches share a read lock and may run in parallel. Each mutating batch holds the write
/// lock across both the add and the save, so writers are serialized and readers observe
/// either the state before a batch or the state after it. File I/O runs on the blocking
/// pool with the guard moved into the task.
#[derive(Debug)]
pub struct SharedVectorStore {
    location: PathBuf,
    inner: Arc<RwLock<VectorStore>>,
}

/// Summary of the corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    pub dimension: Option<usize>,
    pub sources: usize,
}

impl SharedVectorStore {
    /// Load the index stored under `location`, or start empty on first run
    #[inline]
    pub async fn open(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();
        let path = location.clone();
        let store = tokio::task::spawn_blocking(move || VectorStore::load(&path))
            .await
            .map_err(persistence_task_failed)??;
        Ok(Self {
            location,
            inner: Arc::new(RwLock::new(store)),
        })
    }

    #[inline]
    pub fn location(&self) -> &Path {
        &self.location
    }

    #[inline]
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.inner.read().await.search(query, k)
    }

    /// Add one batch and persist it.
    ///
    /// If persisting fails the batch is rolled back in memory, so the in-memory corpus never
    /// runs ahead of what is on disk.
    #[inline]
    pub async fn add_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<usize> {
        let mut store = Arc::clone(&self.inner).write_owned().await;
        let location = self.location.clone();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let previous_len = store.len();
            let previous_dimension = store.dimension();

            let added = store.add(vectors, texts, metadatas)?;
            if added == 0 {
                return Ok(0);
            }

            if let Err(e) = store.save(&location) {
                error!(
                    "Failed to persist batch of {} entries to {}: {}",
                    added,
                    location.display(),
                    e
                );
                store.rollback(previous_len, previous_dimension);
                return Err(e);
            }

            info!("Persisted batch of {} entries ({} total)", added, store.len());
            Ok(added)
        })
        .await
        .map_err(persistence_task_failed)?
    }

    /// Persist the current state.
    ///
    /// Takes the write lock so that no two saves share the temporary file.
    #[inline]
    pub async fn save(&self) -> Result<()> {
        let store = Arc::clone(&self.inner).write_owned().await;
        let location = self.location.clone();
        tokio::task::spawn_blocking(move || store.save(&location))
            .await
            .map_err(persistence_task_failed)?
    }

    #[inline]
    pub async fn stats(&self) -> IndexStats {
        let store = self.inner.read().await;
        let sources = store
            .entries()
            .iter()
            .filter_map(|entry| entry.source())
            .collect::<HashSet<_>>()
            .len();
        IndexStats {
            entries: store.len(),
            dimension: store.dimension(),
            sources,
        }
    }
}

fn persistence_task_failed(e: JoinError) -> RagError {
    RagError::Other(anyhow::anyhow!("index persistence task failed: {e}"))
}
