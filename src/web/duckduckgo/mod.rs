
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use ureq::Agent;
use url::Url;

use super::{SearchHit, WebConfig, WebSearch};
use crate::config::ConfigError;
use crate::{RagError, Result};

/// Elements whose text counts as readable page content
const READABLE_TAGS: &[&str] = &["h1", "h2", "h3", "p", "li"];

/// Page chrome whose text is never readable content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "button",
];

/// Web search backed by the DuckDuckGo HTML endpoint
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    agent: Agent,
    endpoint: Url,
}

impl DuckDuckGoSearch {
    #[inline]
    pub fn new(config: &WebConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.search_endpoint)
            .map_err(|_| ConfigError::InvalidUrl(config.search_endpoint.clone()))?;

        let agent = Agent::config_builder()
            .timeout_global(Some(config.fetch_timeout()))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Ok(Self { agent, endpoint })
    }

    /// Query the endpoint and parse up to `max_results` hits
    #[inline]
    pub fn search_blocking(
        &self,
        query: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let url = Url::parse_with_params(self.endpoint.as_str(), &[("q", query)])
            .context("Failed to build search URL")?;

        debug!("Searching DuckDuckGo: {}", url);
        let html = get_text(&self.agent, url.as_str())?;

        let mut hits = parse_search_results(&html, &self.endpoint);
        hits.truncate(max_results);
        debug!("Parsed {} search hits", hits.len());
        Ok(hits)
    }

    /// Download a page and reduce it to readable text
    #[inline]
    pub fn fetch_readable_blocking(&self, url: &str) -> anyhow::Result<String> {
        let html = get_text(&self.agent, url)?;
        Ok(extract_readable_text(&html))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    #[inline]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let client = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || client.search_blocking(&query, max_results))
            .await
            .map_err(|e| anyhow!("Search task failed: {}", e))?
            .map_err(|e| RagError::WebSource {
                url: self.endpoint.to_string(),
                reason: format!("{e:#}"),
            })
    }

    #[inline]
    async fn fetch_readable(&self, url: &str) -> Result<String> {
        let client = self.clone();
        let target = url.to_string();
        tokio::task::spawn_blocking(move || client.fetch_readable_blocking(&target))
            .await
            .map_err(|e| anyhow!("Fetch task failed: {}", e))?
            .map_err(|e| RagError::WebSource {
                url: url.to_string(),
                reason: format!("{e:#}"),
            })
    }
}

fn get_text(agent: &Agent, url: &str) -> anyhow::Result<String> {
    match agent.get(url).call() {
        Ok(mut response) => response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read response body from {}", url)),
        Err(ureq::Error::StatusCode(code)) => Err(anyhow!("HTTP error {}", code)),
        Err(e) => Err(anyhow::Error::from(e))
            .with_context(|| format!("Failed to make HTTP request to {}", url)),
    }
}

/// Extract result anchors from a DuckDuckGo HTML results page.
///
/// Redirect links (`/l/?uddg=<target>`) are unwrapped to their target; relative links are
/// resolved against `base`. Duplicate and non-HTTP targets are skipped.
#[inline]
pub fn parse_search_results(html: &str, base: &Url) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = resolve_result_url(href, base)?;
            let title = collapse_whitespace(&anchor.text().join(" "));
            Some(SearchHit {
                title: if title.is_empty() { url.clone() } else { title },
                url,
            })
        })
        .unique_by(|hit| hit.url.clone())
        .collect()
}

fn resolve_result_url(href: &str, base: &Url) -> Option<String> {
    let url = base.join(href).ok()?;
    let redirect = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .and_then(|(_, value)| Url::parse(&value).ok());
    let target = redirect.unwrap_or(url);

    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}

/// Reduce an HTML page to its headings, paragraphs and list items, one block per line
#[inline]
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(&READABLE_TAGS.join(", ")) else {
        return String::new();
    };

    document
        .select(&selector)
        .filter(|element| !inside_skipped_or_nested(element))
        .map(|element| collapse_whitespace(&element.text().join(" ")))
        .filter(|block| !block.is_empty())
        .join("\n")
}

fn inside_skipped_or_nested(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value().as_element().is_some_and(|ancestor| {
            let name = ancestor.name();
            SKIPPED_TAGS.contains(&name) || READABLE_TAGS.contains(&name)
        })
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}
