//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use second_gateway::health::{HealthCheck, ServiceState};
use second_gateway::{
    Assistant, AssistantParts, ChatModel, Config, EpisodicStore, Error, Exchange, KeepAlive,
    ModelOptions, PromptMessage, RetrievalItem, SearchSource, Source, SourceTag,
};
use tokio::sync::Mutex;

/// Search source returning fixed items, or failing
pub struct MockSource {
    name: &'static str,
    source: Source,
    items: Vec<RetrievalItem>,
    fail: bool,
    delay: Option<Duration>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    pub fn episodic(items: Vec<RetrievalItem>) -> Self {
        Self::new("watcher", Source::Episodic, items)
    }

    pub fn knowledge(items: Vec<RetrievalItem>) -> Self {
        Self::new("lor", Source::Knowledge, items)
    }

    fn new(name: &'static str, source: Source, items: Vec<RetrievalItem>) -> Self {
        Self {
            name,
            source,
            items,
            fail: false,
            delay: None,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    #[must_use]
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SearchSource for MockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn search(&self, query: &str) -> second_gateway::Result<Vec<RetrievalItem>> {
        self.queries.lock().await.push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::SourceUnavailable {
                name: self.name,
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.items.clone())
    }
}

/// Model that records every prompt and answers from a script
pub struct MockModel {
    reply: Result<String, fn() -> Error>,
    delay: Option<Duration>,
    pub prompts: Arc<Mutex<Vec<Vec<PromptMessage>>>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(make: fn() -> Error) -> Self {
        Self {
            reply: Err(make),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn last_prompt(&self) -> Vec<PromptMessage> {
        self.prompts.lock().await.last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for MockModel {
    fn model_id(&self) -> &str {
        "mock:latest"
    }

    async fn complete(
        &self,
        messages: &[PromptMessage],
        _options: &ModelOptions,
    ) -> second_gateway::Result<String> {
        self.prompts.lock().await.push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(make) => Err(make()),
        }
    }
}

/// Episodic store that records writes
#[derive(Default)]
pub struct MockStore {
    pub exchanges: Arc<Mutex<Vec<Exchange>>>,
    pub notes: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

#[async_trait]
impl EpisodicStore for MockStore {
    async fn store_exchange(&self, exchange: &Exchange) -> second_gateway::Result<()> {
        if self.fail {
            return Err(Error::Persistence("watcher returned 503".to_string()));
        }
        self.exchanges.lock().await.push(exchange.clone());
        Ok(())
    }

    async fn store_note(&self, note: &str) -> second_gateway::Result<()> {
        if self.fail {
            return Err(Error::Persistence("watcher returned 503".to_string()));
        }
        self.notes.lock().await.push(note.to_string());
        Ok(())
    }
}

/// Health check with a fixed answer
pub struct FixedHealth(pub &'static str, pub ServiceState);

#[async_trait]
impl HealthCheck for FixedHealth {
    fn service_name(&self) -> &'static str {
        self.0
    }

    async fn health(&self) -> ServiceState {
        self.1
    }
}

/// Keep-alive indicator counting pulses
#[derive(Default)]
pub struct CountingIndicator {
    pub pulses: AtomicUsize,
}

impl CountingIndicator {
    pub fn count(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepAlive for CountingIndicator {
    async fn pulse(&self) -> second_gateway::Result<()> {
        self.pulses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keep-alive indicator whose pulse never returns
pub struct HungIndicator;

#[async_trait]
impl KeepAlive for HungIndicator {
    async fn pulse(&self) -> second_gateway::Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Episodic item with a score
pub fn memory(text: &str, score: f64) -> RetrievalItem {
    RetrievalItem::new(text, score, SourceTag::Episodic)
}

/// Knowledge-base item with a score
pub fn doc(text: &str, score: f64) -> RetrievalItem {
    RetrievalItem::new(text, score, SourceTag::KnowledgeDocs)
}

/// Handles to the mocks behind a test assistant
pub struct Harness {
    pub assistant: Assistant,
    pub model: Arc<MockModel>,
    pub store: Arc<MockStore>,
}

/// Build an assistant over mock collaborators with default tuning
pub fn harness(episodic: MockSource, knowledge: MockSource, model: MockModel) -> Harness {
    harness_with_store(episodic, knowledge, model, MockStore::default())
}

pub fn harness_with_store(
    episodic: MockSource,
    knowledge: MockSource,
    model: MockModel,
    store: MockStore,
) -> Harness {
    let model = Arc::new(model);
    let store = Arc::new(store);

    let parts = AssistantParts {
        episodic: Arc::new(episodic),
        knowledge: Arc::new(knowledge),
        model: model.clone(),
        store: store.clone(),
        health: vec![
            Arc::new(FixedHealth("ollama", ServiceState::Up)) as Arc<dyn HealthCheck>,
            Arc::new(FixedHealth("watcher", ServiceState::Up)) as Arc<dyn HealthCheck>,
            Arc::new(FixedHealth("lor", ServiceState::Down)) as Arc<dyn HealthCheck>,
        ],
    };

    Harness {
        assistant: Assistant::new(&Config::default(), parts),
        model,
        store,
    }
}
