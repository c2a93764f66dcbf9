// Service module
// Explicitly constructed owner of the index, models and pipeline for one process


use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::database::{IndexStats, SharedVectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::generation::Generator;
use crate::indexer::Indexer;
use crate::pipeline::{AnswerPipeline, AnswerReport};
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::web::{DuckDuckGoSearch, WebSearch};
use crate::{RagError, Result};

/// Everything needed to ingest lectures and answer questions.
///
/// Built once at startup and passed by reference to whatever serves requests. Dropping it
/// releases the models; call [`RagService::shutdown`] first to flush the index.
pub struct RagService {
    config: Config,
    store: Arc<SharedVectorStore>,
    indexer: Indexer,
    pipeline: AnswerPipeline,
}

impl RagService {
    /// Validate configuration, check the models are reachable and load the index.
    ///
    /// Fails with `ModelUnavailable` when Ollama or either configured model is missing, and
    /// with `CorruptIndex` when a stored index cannot be read.
    #[inline]
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let client = OllamaClient::new(&config.ollama)?;
        let probe = client.clone();
        tokio::task::spawn_blocking(move || probe.health_check())
            .await
            .map_err(|e| RagError::ModelUnavailable(format!("health check task failed: {e}")))?
            .map_err(|e| RagError::ModelUnavailable(format!("{e:#}")))?;

        let web: Option<Arc<dyn WebSearch>> = if config.web.enabled {
            Some(Arc::new(DuckDuckGoSearch::new(&config.web)?))
        } else {
            debug!("Web search disabled by configuration");
            None
        };

        let client = Arc::new(client);
        Self::from_parts(
            config,
            Arc::clone(&client) as Arc<dyn Embedder>,
            client,
            web,
        )
        .await
    }

    /// Assemble a service from explicit collaborators
    #[inline]
    pub async fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        web: Option<Arc<dyn WebSearch>>,
    ) -> Result<Self> {
        let store = Arc::new(SharedVectorStore::open(config.index_path()).await?);

        let indexer = Indexer::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            config.chunking.clone(),
        )?;
        let retriever = Retriever::new(
            embedder,
            Arc::clone(&store),
            config.prompt.lecture_excerpt_chars,
        );
        let pipeline = AnswerPipeline::new(
            retriever,
            generator,
            web,
            config.web.clone(),
            PromptAssembler::new(config.prompt.clone()),
        );

        info!("Service ready (index at {})", store.location().display());
        Ok(Self {
            config,
            store,
            indexer,
            pipeline,
        })
    }

    #[inline]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub const fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    #[inline]
    pub const fn pipeline(&self) -> &AnswerPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn store(&self) -> &SharedVectorStore {
        &self.store
    }

    /// The outward query entry point
    #[inline]
    pub async fn answer(&self, query: &str, use_web: bool, k: usize) -> Result<String> {
        self.pipeline.answer(query, use_web, k).await
    }

    #[inline]
    pub async fn answer_with_report(
        &self,
        query: &str,
        use_web: bool,
        k: usize,
    ) -> Result<AnswerReport> {
        self.pipeline.answer_with_report(query, use_web, k).await
    }

    #[inline]
    pub async fn stats(&self) -> IndexStats {
        self.store.stats().await
    }

    /// Flush the index and release the service
    #[inline]
    pub async fn shutdown(self) -> Result<()> {
        self.store.save().await?;
        info!("Service shut down");
        Ok(())
    }
}
