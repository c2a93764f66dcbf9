//! Prompt Assembly
//!
//! Builds the generator input from a fixed instruction, the question, citation-tagged
//! lecture excerpts (`[L<i>]`) and web excerpts (`[W<i>]`). When the estimated size exceeds
//! the input token budget, excerpts are dropped one at a time from the end of whichever
//! section currently holds more of them (the web section on a tie) until the prompt fits.


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embeddings::chunking::estimate_token_count;
use crate::retriever::RetrievedChunk;
use crate::web::WebSnippet;

/// Substituted for an empty section so the template shape never changes
pub const PLACEHOLDER: &str = "(none)";

const SYSTEM_INSTRUCTION: &str = "You are an expert assistant grounded in the user's lecture notes.
Use the provided CONTEXT (from the lectures) and, if present, WEB_SNIPPETS (fresh information from the internet).
Cite inline with [L<n>] for lecture excerpts and [W<n>] for web snippets.
Be precise and concise. If unsure, say so.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Character budget per lecture excerpt
    pub lecture_excerpt_chars: usize,
    /// Character budget per web excerpt
    pub web_excerpt_chars: usize,
    /// Most web excerpts ever placed in a prompt
    pub max_web_results: usize,
    /// Estimated tokens the generation model accepts as input
    pub input_token_budget: usize,
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for PromptConfig {
    #[inline]
    fn default() -> Self {
        Self {
            lecture_excerpt_chars: 1200,
            web_excerpt_chars: 1500,
            max_web_results: 3,
            input_token_budget: 3072,
            max_output_tokens: 124,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// A fully rendered prompt and what went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    pub lecture_section: String,
    pub web_section: String,
    pub lecture_included: usize,
    pub web_included: usize,
    pub dropped_lecture: usize,
    pub dropped_web: usize,
    pub estimated_tokens: usize,
}

impl AssembledPrompt {
    #[inline]
    pub const fn within_budget(&self, budget: usize) -> bool {
        self.estimated_tokens <= budget
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    #[inline]
    pub const fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub const fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Render the prompt, dropping the lowest-ranked excerpts until it fits the budget.
    ///
    /// Deterministic for identical inputs. If the prompt is still over budget with both
    /// sections empty it is returned as is.
    #[inline]
    pub fn assemble(
        &self,
        question: &str,
        lecture: &[RetrievedChunk],
        web: &[WebSnippet],
    ) -> AssembledPrompt {
        let lecture_excerpts = lecture
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "[L{}] {}",
                    i + 1,
                    truncate_chars(&chunk.text, self.config.lecture_excerpt_chars)
                )
            })
            .collect::<Vec<_>>();

        let web_excerpts = web
            .iter()
            .take(self.config.max_web_results)
            .enumerate()
            .map(|(i, snippet)| {
                format!(
                    "[W{}] {}\n{}\n(Source: {})",
                    i + 1,
                    snippet.title,
                    truncate_chars(&snippet.text, self.config.web_excerpt_chars),
                    snippet.url
                )
            })
            .collect::<Vec<_>>();

        let mut lecture_count = lecture_excerpts.len();
        let mut web_count = web_excerpts.len();

        loop {
            let lecture_section = render_section(&lecture_excerpts[..lecture_count]);
            let web_section = render_section(&web_excerpts[..web_count]);
            let text = render(question, &lecture_section, &web_section);
            let estimated_tokens = estimate_token_count(&text);

            let fits = estimated_tokens <= self.config.input_token_budget;
            if fits || (lecture_count == 0 && web_count == 0) {
                if !fits {
                    warn!(
                        "Prompt needs ~{} tokens with no excerpts left to drop (budget {})",
                        estimated_tokens, self.config.input_token_budget
                    );
                }
                let prompt = AssembledPrompt {
                    text,
                    lecture_section,
                    web_section,
                    lecture_included: lecture_count,
                    web_included: web_count,
                    dropped_lecture: lecture_excerpts.len() - lecture_count,
                    dropped_web: web_excerpts.len() - web_count,
                    estimated_tokens,
                };
                debug!(
                    "Assembled prompt: {} lecture / {} web excerpts, ~{} tokens",
                    prompt.lecture_included, prompt.web_included, prompt.estimated_tokens
                );
                return prompt;
            }

            if web_count >= lecture_count {
                web_count -= 1;
            } else {
                lecture_count -= 1;
            }
        }
    }
}

fn render_section(excerpts: &[String]) -> String {
    if excerpts.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        excerpts.iter().join("\n\n")
    }
}

fn render(question: &str, context: &str, web: &str) -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\nQuestion:\n{question}\n\nCONTEXT (Lectures):\n{context}\n\nWEB_SNIPPETS (Optional):\n{web}\n\nAnswer:\n"
    )
}

/// Longest prefix of `text` holding at most `max_chars` characters
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text.get(..end).unwrap_or(text),
        None => text,
    }
}
