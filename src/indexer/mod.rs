// Indexer module
// Turns lecture files into chunks, embeddings and index entries

pub mod loader;


use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::database::{CHUNK_INDEX_KEY, INGESTED_AT_KEY, Metadata, PATH_KEY, SharedVectorStore};
use crate::embeddings::{ChunkingConfig, Document, Embedder, chunk_document};
use crate::{RagError, Result};

pub use loader::{Extraction, collect_files, extract_text};

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    /// Files skipped because no text could be extracted, with the reason
    pub failed_sources: Vec<(PathBuf, String)>,
}

/// Writes documents into the shared index, one atomic batch per document
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<SharedVectorStore>,
    chunking: ChunkingConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<SharedVectorStore>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        chunking.validate()?;
        Ok(Self {
            embedder,
            store,
            chunking,
        })
    }

    /// Chunk, embed and add one document. Returns the number of chunks added.
    ///
    /// Not idempotent: ingesting the same document twice stores its chunks twice.
    #[inline]
    pub async fn ingest_document(&self, document: Document) -> Result<usize> {
        let chunks = chunk_document(&document, &self.chunking)?;
        let texts = chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>();

        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        let ingested_at = Utc::now().to_rfc3339();
        let metadatas = chunks
            .iter()
            .map(|chunk| {
                Metadata::from([
                    (PATH_KEY.to_string(), chunk.source.clone()),
                    (CHUNK_INDEX_KEY.to_string(), chunk.position.to_string()),
                    (INGESTED_AT_KEY.to_string(), ingested_at.clone()),
                ])
            })
            .collect();

        let added = self.store.add_batch(vectors, texts, metadatas).await?;
        debug!("Indexed {} chunks from {}", added, document.source);
        Ok(added)
    }

    /// Ingest the result of an external text extraction
    #[inline]
    pub async fn ingest_extraction(&self, source: &str, extraction: Extraction) -> Result<usize> {
        let text = extraction.into_result(source)?;
        self.ingest_document(Document::new(source, text)).await
    }

    /// Ingest a single file or every supported file under a directory.
    ///
    /// Files whose text cannot be extracted are recorded and skipped. Embedding and index
    /// failures abort the run; documents ingested before the failure stay in the index.
    #[inline]
    pub async fn ingest_path(&self, path: &Path) -> Result<IndexingStats> {
        let files = if tokio::fs::metadata(path).await?.is_dir() {
            collect_files(path).await?
        } else {
            vec![path.to_path_buf()]
        };

        info!("Ingesting {} files from {}", files.len(), path.display());

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{bar:30} [{pos}/{len}] Ingesting {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut stats = IndexingStats::default();
        for file in files {
            let source = file.display().to_string();
            bar.set_message(source.clone());

            match extract_text(&file).await {
                Extraction::Text(text) => {
                    let chunks = self.ingest_document(Document::new(&source, text)).await?;
                    stats.documents_processed += 1;
                    stats.chunks_created += chunks;
                    stats.embeddings_generated += chunks;
                }
                Extraction::ExtractionFailed { reason } => {
                    warn!("Skipping {}: {}", source, reason);
                    stats.documents_failed += 1;
                    stats.failed_sources.push((file, reason));
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        info!(
            "Ingestion complete: {} documents, {} chunks, {} failed",
            stats.documents_processed, stats.chunks_created, stats.documents_failed
        );
        Ok(stats)
    }
}
