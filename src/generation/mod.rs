// Generation module
// Contract for the causal language model and post-processing of its output


use async_trait::async_trait;

use crate::{RagError, Result};

/// Input to a single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Context window to request: the prompt budget plus the output allowance
    pub context_tokens: usize,
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

/// Produces text from an assembled prompt. Blocking per call; no streaming.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Remove a leading echo of the prompt, which some backends include in their output
#[inline]
pub fn strip_prompt_echo<'a>(prompt: &str, output: &'a str) -> &'a str {
    output.strip_prefix(prompt).unwrap_or(output).trim()
}

/// Turn raw model output into the final answer, rejecting empty completions
#[inline]
pub fn finalize_answer(prompt: &str, output: &str) -> Result<String> {
    let answer = strip_prompt_echo(prompt, output);
    if answer.is_empty() {
        return Err(RagError::Generation(
            "model returned an empty answer".to_string(),
        ));
    }
    Ok(answer.to_string())
}
