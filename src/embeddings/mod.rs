// Embeddings module
// Text chunking, the embedding contract, and the Ollama-backed implementation

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{
    Chunk, ChunkingConfig, Document, chunk_document, chunk_text, estimate_token_count,
};
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension, L2-normalized vectors.
///
/// Output order matches input order exactly; batching is an implementation detail.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Scale a vector to unit length so cosine similarity reduces to a dot product.
///
/// Zero vectors are left untouched.
#[inline]
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two equal-length vectors
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
