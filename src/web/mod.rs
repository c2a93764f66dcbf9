// Web search module
// Optional secondary retrieval source with per-source failure isolation

pub mod duckduckgo;


use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::prompt::truncate_chars;
use crate::{RagError, Result};

pub use duckduckgo::DuckDuckGoSearch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Whether `ask` consults the web unless told otherwise
    pub enabled: bool,
    /// Upper bound on sources fetched per query, and on concurrent fetches
    pub max_sources: usize,
    /// Per-source timeout covering the page download and extraction
    pub fetch_timeout_seconds: u64,
    pub user_agent: String,
    /// DuckDuckGo HTML endpoint
    pub search_endpoint: String,
}

impl Default for WebConfig {
    #[inline]
    fn default() -> Self {
        Self {
            enabled: true,
            max_sources: 3,
            fetch_timeout_seconds: 10,
            user_agent: "Mozilla/5.0 (compatible; lecture-rag/0.1)".to_string(),
            search_endpoint: "https://html.duckduckgo.com/html/".to_string(),
        }
    }
}

impl WebConfig {
    #[inline]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// A ranked search result before its page has been fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Readable text from one web source, already truncated to the excerpt budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSnippet {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// Why a single source contributed nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSourceFailure {
    /// Page URL, or the query when the search itself failed
    pub source: String,
    pub reason: String,
}

impl From<RagError> for WebSourceFailure {
    #[inline]
    fn from(error: RagError) -> Self {
        match error {
            RagError::WebSource { url, reason } => Self {
                source: url,
                reason,
            },
            other => Self {
                source: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Outcome of the web stage for one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebFetchReport {
    /// Successful snippets in search-rank order
    pub snippets: Vec<WebSnippet>,
    pub failures: Vec<WebSourceFailure>,
}

/// External web search collaborator.
///
/// Both calls are fallible and may be slow; callers bound them with their own timeouts.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Ordered (title, url) hits for `query`, at most `max_results` long
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    /// Readable text of the page at `url`
    async fn fetch_readable(&self, url: &str) -> Result<String>;
}

/// Search the web and fetch each hit independently.
///
/// Fetches run concurrently, at most `config.max_sources` at a time, each under its own
/// timeout. A failing or hanging source is recorded in the report and never affects the
/// others. This function does not fail.
#[inline]
pub async fn fetch_web_snippets(
    search: &dyn WebSearch,
    query: &str,
    config: &WebConfig,
    excerpt_chars: usize,
) -> WebFetchReport {
    let timeout = config.fetch_timeout();
    let fan_out = config.max_sources.max(1);

    let hits = match tokio::time::timeout(timeout, search.search(query, config.max_sources)).await
    {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => {
            warn!("Web search for {:?} failed: {}", query, e);
            return WebFetchReport {
                snippets: Vec::new(),
                failures: vec![WebSourceFailure {
                    source: query.to_string(),
                    reason: format!("search failed: {e}"),
                }],
            };
        }
        Err(_) => {
            warn!("Web search for {:?} timed out after {:?}", query, timeout);
            return WebFetchReport {
                snippets: Vec::new(),
                failures: vec![WebSourceFailure {
                    source: query.to_string(),
                    reason: format!("search timed out after {}s", config.fetch_timeout_seconds),
                }],
            };
        }
    };

    debug!("Web search returned {} hits", hits.len());

    let outcomes = stream::iter(hits.into_iter().take(config.max_sources))
        .map(|hit| async move {
            let outcome = fetch_one(search, &hit, timeout, excerpt_chars).await;
            (hit, outcome)
        })
        .buffered(fan_out)
        .collect::<Vec<_>>()
        .await;

    let mut report = WebFetchReport::default();
    for (hit, outcome) in outcomes {
        match outcome {
            Ok(snippet) => report.snippets.push(snippet),
            Err(reason) => {
                warn!("Skipping web source {}: {}", hit.url, reason);
                report.failures.push(WebSourceFailure {
                    source: hit.url,
                    reason,
                });
            }
        }
    }

    info!(
        "Web stage: {} snippets, {} failed sources",
        report.snippets.len(),
        report.failures.len()
    );
    report
}

async fn fetch_one(
    search: &dyn WebSearch,
    hit: &SearchHit,
    timeout: Duration,
    excerpt_chars: usize,
) -> std::result::Result<WebSnippet, String> {
    let text = match tokio::time::timeout(timeout, search.fetch_readable(&hit.url)).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => return Err(WebSourceFailure::from(e).reason),
        Err(_) => return Err(format!("timed out after {}s", timeout.as_secs())),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err("no readable text".to_string());
    }

    Ok(WebSnippet {
        title: hit.title.clone(),
        url: hit.url.clone(),
        text: truncate_chars(text, excerpt_chars).to_string(),
    })
}
