// Deterministic test doubles for the external collaborators

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embeddings::{Embedder, l2_normalize};
use crate::generation::{GenerationRequest, Generator};
use crate::web::{SearchHit, WebSearch};
use crate::{RagError, Result};

pub const TEST_DIMENSION: usize = 512;

/// Bag-of-words embedder: each lowercase alphanumeric token hashes into one bucket
#[derive(Debug, Default)]
pub struct HashingEmbedder {
    pub calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn embed_one(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; TEST_DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let bucket = fnv1a(&token.to_lowercase()) % TEST_DIMENSION as u64;
            vector[bucket as usize] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::embed_one(text)).collect())
    }
}

/// Embedder that always fails, as if the model were gone
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("model went away".to_string()))
    }
}

/// Generator returning a fixed reply and recording every request
#[derive(Debug)]
pub struct RecordingGenerator {
    reply: std::result::Result<String, String>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .map(|request| request.prompt.clone())
            .expect("generator should have been called")
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .len()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("lock should not be poisoned")
            .push(request.clone());
        self.reply.clone().map_err(RagError::Generation)
    }
}

/// How a scripted page responds to a fetch
#[derive(Debug, Clone)]
pub enum PageScript {
    Text(String),
    Fail(String),
    Hang,
}

/// Web search with canned hits and per-URL page behavior
#[derive(Debug, Default)]
pub struct ScriptedWebSearch {
    hits: Vec<SearchHit>,
    pages: HashMap<String, PageScript>,
    search_error: Option<String>,
    pub search_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedWebSearch {
    pub fn with_page(mut self, title: &str, url: &str, script: PageScript) -> Self {
        self.hits.push(SearchHit {
            title: title.to_string(),
            url: url.to_string(),
        });
        self.pages.insert(url.to_string(), script);
        self
    }

    pub fn failing_search(reason: &str) -> Self {
        Self {
            search_error: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst) + self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for ScriptedWebSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.search_error {
            return Err(RagError::WebSource {
                url: "search".to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    async fn fetch_readable(&self, url: &str) -> Result<String> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url).cloned() {
            Some(PageScript::Text(text)) => Ok(text),
            Some(PageScript::Fail(reason)) => Err(RagError::WebSource {
                url: url.to_string(),
                reason,
            }),
            Some(PageScript::Hang) => std::future::pending().await,
            None => Err(RagError::WebSource {
                url: url.to_string(),
                reason: "unknown page".to_string(),
            }),
        }
    }
}
