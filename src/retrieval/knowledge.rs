//! LOR knowledge base client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_SOURCE_TIMEOUT, MIN_RELEVANCE_SCORE, RetrievalItem, SearchSource, Source, SourceTag,
    retain_relevant, unavailable,
};
use crate::health::{self, HealthCheck, ServiceState};
use crate::{Config, Result};

/// Number of passages requested per search
const DEFAULT_TOP_K: usize = 3;

/// Service name used in logs and health reports
const NAME: &str = "lor";

/// Search request body for `POST /api/search`
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Search response envelope
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Passage>,
}

/// A knowledge-base passage
#[derive(Debug, Deserialize)]
struct Passage {
    #[serde(default)]
    text: String,
    #[serde(default)]
    score: f64,
    #[serde(default = "default_collection")]
    collection: String,
}

fn default_collection() -> String {
    "docs".to_string()
}

/// HTTP client for the LOR knowledge base
#[derive(Debug, Clone)]
pub struct LorClient {
    base_url: String,
    client: reqwest::Client,
    top_k: usize,
    min_score: f64,
    timeout: Duration,
    health_timeout: Duration,
}

impl LorClient {
    /// Create a client with default limits and timeouts
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            top_k: DEFAULT_TOP_K,
            min_score: MIN_RELEVANCE_SCORE,
            timeout: DEFAULT_SOURCE_TIMEOUT,
            health_timeout: health::DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Create a client from gateway configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.lor_url)
            .with_top_k(config.retrieval.knowledge_top_k)
            .with_min_score(config.retrieval.min_relevance)
            .with_timeout(config.retrieval.source_timeout)
            .with_health_timeout(config.health_timeout)
    }

    /// Set the number of passages requested per search
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the relevance threshold applied to search results
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the search timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the health probe timeout
    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

#[async_trait]
impl SearchSource for LorClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn source(&self) -> Source {
        Source::Knowledge
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievalItem>> {
        let response: SearchResponse = self
            .client
            .post(format!("{}/api/search", self.base_url))
            .timeout(self.timeout)
            .json(&SearchRequest {
                query,
                top_k: self.top_k,
            })
            .send()
            .await
            .map_err(|e| unavailable(NAME, e))?
            .error_for_status()
            .map_err(|e| unavailable(NAME, e))?
            .json()
            .await
            .map_err(|e| unavailable(NAME, e))?;

        let items = response
            .results
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| {
                let tag = SourceTag::from_collection(&p.collection);
                RetrievalItem::new(p.text, p.score, tag)
            })
            .collect();

        Ok(retain_relevant(items, self.min_score))
    }
}

#[async_trait]
impl HealthCheck for LorClient {
    fn service_name(&self) -> &'static str {
        NAME
    }

    async fn health(&self) -> ServiceState {
        health::probe(
            &self.client,
            &format!("{}/health", self.base_url),
            self.health_timeout,
        )
        .await
    }
}
