//! Watcher episodic memory client
//!
//! Watcher stores past exchanges and notes as episodes and serves
//! similarity search over them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    DEFAULT_SOURCE_TIMEOUT, MIN_RELEVANCE_SCORE, RetrievalItem, SearchSource, Source, SourceTag,
    retain_relevant, unavailable,
};
use crate::config::{DEFAULT_EVENT_SOURCE, DEFAULT_NOTE_AUTHOR};
use crate::health::{self, HealthCheck, ServiceState};
use crate::persistence::{EpisodicStore, Exchange};
use crate::{Config, Error, Result};

/// Number of episodes requested per search
const DEFAULT_LIMIT: usize = 5;

/// Default timeout for event writes
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Service name used in logs and health reports
const NAME: &str = "watcher";

/// Search request body for `POST /query/search`
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

/// A single episode returned by search
#[derive(Debug, Deserialize)]
struct Episode {
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

/// Event body for `POST /events`
#[derive(Debug, Serialize)]
struct EventRequest<'a> {
    source: &'a str,
    event_type: &'a str,
    content: &'a str,
    metadata: serde_json::Value,
}

/// HTTP client for the Watcher episodic memory service
#[derive(Debug, Clone)]
pub struct WatcherClient {
    base_url: String,
    client: reqwest::Client,
    limit: usize,
    min_score: f64,
    search_timeout: Duration,
    write_timeout: Duration,
    health_timeout: Duration,
    event_source: String,
    note_author: String,
}

impl WatcherClient {
    /// Create a client with default limits and timeouts
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            limit: DEFAULT_LIMIT,
            min_score: MIN_RELEVANCE_SCORE,
            search_timeout: DEFAULT_SOURCE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            health_timeout: health::DEFAULT_PROBE_TIMEOUT,
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            note_author: DEFAULT_NOTE_AUTHOR.to_string(),
        }
    }

    /// Create a client from gateway configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.watcher_url)
            .with_limit(config.retrieval.episodic_limit)
            .with_min_score(config.retrieval.min_relevance)
            .with_timeouts(config.retrieval.source_timeout, config.persist_timeout)
            .with_health_timeout(config.health_timeout)
            .with_event_source(&config.event_source, &config.note_author)
    }

    /// Set the number of episodes requested per search
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the relevance threshold applied to search results
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the search and write timeouts
    #[must_use]
    pub fn with_timeouts(mut self, search: Duration, write: Duration) -> Self {
        self.search_timeout = search;
        self.write_timeout = write;
        self
    }

    /// Set the health probe timeout
    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Set the event source tag and the author recorded on notes
    #[must_use]
    pub fn with_event_source(mut self, source: &str, note_author: &str) -> Self {
        source.clone_into(&mut self.event_source);
        note_author.clone_into(&mut self.note_author);
        self
    }

    /// Base URL of the service
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post an event; only `200 OK` counts as stored
    async fn post_event(&self, event: &EventRequest<'_>) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/events", self.base_url))
            .timeout(self.write_timeout)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Persistence(format!("watcher returned {status}")));
        }

        Ok(())
    }
}

#[async_trait]
impl SearchSource for WatcherClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn source(&self) -> Source {
        Source::Episodic
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievalItem>> {
        let episodes: Vec<Episode> = self
            .client
            .post(format!("{}/query/search", self.base_url))
            .timeout(self.search_timeout)
            .json(&SearchRequest {
                query,
                limit: self.limit,
            })
            .send()
            .await
            .map_err(|e| unavailable(NAME, e))?
            .error_for_status()
            .map_err(|e| unavailable(NAME, e))?
            .json()
            .await
            .map_err(|e| unavailable(NAME, e))?;

        let items = episodes
            .into_iter()
            .filter(|ep| !ep.content.trim().is_empty())
            .map(|ep| RetrievalItem::new(ep.content, ep.score, SourceTag::Episodic))
            .collect();

        Ok(retain_relevant(items, self.min_score))
    }
}

#[async_trait]
impl EpisodicStore for WatcherClient {
    async fn store_exchange(&self, exchange: &Exchange) -> Result<()> {
        let content = exchange.content();
        self.post_event(&EventRequest {
            source: &self.event_source,
            event_type: "conversation",
            content: &content,
            metadata: exchange.metadata(),
        })
        .await
    }

    async fn store_note(&self, note: &str) -> Result<()> {
        self.post_event(&EventRequest {
            source: &self.event_source,
            event_type: "note",
            content: note,
            metadata: serde_json::json!({
                "via": self.event_source,
                "author": self.note_author,
            }),
        })
        .await
    }
}

#[async_trait]
impl HealthCheck for WatcherClient {
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
