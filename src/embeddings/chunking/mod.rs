
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// A passage of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The passage text, words joined by single spaces
    pub text: String,
    /// Identifier of the document this chunk came from
    pub source: String,
    /// Position of this chunk within its document
    pub position: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// A named source and its raw extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Configuration for content chunking, measured in whitespace-separated words
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per window
    pub size: usize,
    /// Words shared between consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            size: 900,
            overlap: 150,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub const fn validate(&self) -> Result<()> {
        if self.size == 0 || self.overlap >= self.size {
            return Err(RagError::InvalidChunking {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows
    #[inline]
    pub const fn step(&self) -> usize {
        self.size - self.overlap
    }
}

/// Split text into windows of `size` words, each starting `size - overlap` words after the last.
///
/// The final window may be shorter than `size`. Windows stop as soon as one reaches the end of
/// the text, so no trailing window is wholly contained in its predecessor.
#[inline]
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkingConfig { size, overlap };
    config.validate()?;

    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Err(RagError::EmptyDocument);
    }

    let mut chunks = Vec::with_capacity(words.len().div_ceil(config.step()));
    let mut start = 0;
    loop {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += config.step();
    }

    Ok(chunks)
}

/// Chunk a document into positioned passages
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let chunks = chunk_text(&document.text, config.size, config.overlap)?
        .into_iter()
        .enumerate()
        .map(|(position, text)| Chunk {
            token_count: estimate_token_count(&text),
            text,
            source: document.source.clone(),
            position,
        })
        .collect::<Vec<_>>();

    debug!(
        "Chunked document '{}' into {} chunks (avg {} tokens)",
        document.source,
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Rebuild the word sequence of a document from its chunks by dropping each overlap
#[inline]
pub fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut words: Vec<&str> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let skip = if i == 0 { 0 } else { overlap };
        words.extend(chunk.split_whitespace().skip(skip));
    }
    words.join(" ")
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
