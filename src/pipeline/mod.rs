//! Answer Pipeline
//!
//! Local retrieval and the optional web stage run concurrently. The web stage never fails
//! the pipeline: sources that fail are reported and left out, and an empty web section is
//! rendered as the placeholder. Embedder, index and generator failures end the request,
//! and a failed retrieval cancels any web fetches still in flight.

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{RagError, Result};
use crate::generation::{GenerationRequest, Generator, finalize_answer};
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::web::{WebConfig, WebFetchReport, WebSearch, WebSourceFailure, fetch_web_snippets};

/// Stages of a single answer request, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    RetrievingLocal,
    FetchingWeb,
    Assembling,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RetrievingLocal => "retrieving_local",
            Self::FetchingWeb => "fetching_web",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything a caller may want to know about one answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerReport {
    pub answer: String,
    /// Source paths of the lecture excerpts placed in the prompt, in citation order
    pub lecture_sources: Vec<String>,
    /// URLs of the web excerpts placed in the prompt, in citation order
    pub web_sources: Vec<String>,
    pub web_failures: Vec<WebSourceFailure>,
    pub dropped_lecture: usize,
    pub dropped_web: usize,
    pub stages: Vec<PipelineStage>,
}

#[derive(Clone)]
pub struct AnswerPipeline {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    web: Option<Arc<dyn WebSearch>>,
    web_config: WebConfig,
    assembler: PromptAssembler,
}

impl AnswerPipeline {
    #[inline]
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        web: Option<Arc<dyn WebSearch>>,
        web_config: WebConfig,
        assembler: PromptAssembler,
    ) -> Self {
        Self {
            retriever,
            generator,
            web,
            web_config,
            assembler,
        }
    }

    /// Answer `query` from the top `k` lecture excerpts and, if `use_web`, web snippets
    #[inline]
    pub async fn answer(&self, query: &str, use_web: bool, k: usize) -> Result<String> {
        self.answer_with_report(query, use_web, k)
            .await
            .map(|report| report.answer)
    }

    #[inline]
    pub async fn answer_with_report(
        &self,
        query: &str,
        use_web: bool,
        k: usize,
    ) -> Result<AnswerReport> {
        let mut stages = Vec::new();
        let result = self.run(query, use_web, k, &mut stages).await;
        if let Err(e) = &result {
            let failed_in = stages.last().copied().unwrap_or(PipelineStage::RetrievingLocal);
            error!("Answer pipeline failed while {}: {}", failed_in, e);
            stages.push(PipelineStage::Failed);
        }
        result
    }

    async fn run(
        &self,
        query: &str,
        use_web: bool,
        k: usize,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<AnswerReport> {
        let web = if use_web { self.web.as_deref() } else { None };
        if use_web && web.is_none() {
            debug!("Web search requested but not configured; continuing without it");
        }

        enter(stages, PipelineStage::RetrievingLocal);
        if web.is_some() {
            enter(stages, PipelineStage::FetchingWeb);
        }

        let web_stage = async {
            Ok::<_, RagError>(match web {
                Some(search) => {
                    fetch_web_snippets(
                        search,
                        query,
                        &self.web_config,
                        self.assembler.config().web_excerpt_chars,
                    )
                    .await
                }
                None => WebFetchReport::default(),
            })
        };
        let (chunks, web_report) =
            tokio::try_join!(self.retriever.retrieve(query, k), web_stage)?;

        enter(stages, PipelineStage::Assembling);
        let prompt = self.assembler.assemble(query, &chunks, &web_report.snippets);

        enter(stages, PipelineStage::Generating);
        let config = self.assembler.config();
        let request = GenerationRequest {
            prompt: prompt.text,
            context_tokens: config.input_token_budget + config.max_output_tokens,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        };
        let output = self.generator.generate(&request).await?;
        let answer = finalize_answer(&request.prompt, &output)?;

        enter(stages, PipelineStage::Done);
        info!(
            "Answered with {} lecture and {} web excerpts ({} web sources failed)",
            prompt.lecture_included,
            prompt.web_included,
            web_report.failures.len()
        );

        Ok(AnswerReport {
            answer,
            lecture_sources: chunks
                .iter()
                .take(prompt.lecture_included)
                .map(|chunk| chunk.source().unwrap_or_default().to_string())
                .collect(),
            web_sources: web_report
                .snippets
                .iter()
                .take(prompt.web_included)
                .map(|snippet| snippet.url.clone())
                .collect(),
            web_failures: web_report.failures,
            dropped_lecture: prompt.dropped_lecture,
            dropped_web: prompt.dropped_web,
            stages: stages.clone(),
        })
    }
}

fn enter(stages: &mut Vec<PipelineStage>, stage: PipelineStage) {
    debug!("Pipeline stage: {}", stage);
    stages.push(stage);
}
