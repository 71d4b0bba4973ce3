//! Per-message exchange handling
//!
//! [`Assistant`] owns every collaborator of one exchange: the two retrieval
//! sources, the compositor, the history store, the model and the episodic
//! store. A transport adapter hands it a conversation id and raw text and
//! gets back reply segments ready to send.
//!
//! Within one conversation, exchanges are serialized by holding the
//! conversation's history lock from retrieval until the reply is appended.
//! Different conversations proceed concurrently.

use std::sync::Arc;
use std::time::Duration;

use crate::chunking::split_message;
use crate::context::{ContextCompositor, ConversationWindow, HistoryStore};
use crate::health::{self, HealthCheck, StatusReport};
use crate::keepalive::{Heartbeat, KeepAlive};
use crate::llm::{ChatModel, ModelOptions, OllamaClient};
use crate::persistence::{BackgroundTasks, EpisodicStore, Exchange};
use crate::prompt::{self, PromptMessage};
use crate::retrieval::{LorClient, RetrievalOutcome, Retriever, SearchSource, WatcherClient};
use crate::{Config, Error, Result};

/// Collaborators an [`Assistant`] is built from
pub struct AssistantParts {
    pub episodic: Arc<dyn SearchSource>,
    pub knowledge: Arc<dyn SearchSource>,
    pub model: Arc<dyn ChatModel>,
    pub store: Arc<dyn EpisodicStore>,
    /// Services listed by `status`, in report order
    pub health: Vec<Arc<dyn HealthCheck>>,
}

/// Reply to one incoming message
#[derive(Debug)]
pub struct Reply {
    /// Full reply text, or the error message shown to the user
    pub text: String,
    /// `text` split for transmission
    pub segments: Vec<String>,
    /// Source summary of the context used
    pub sources: String,
    /// Whether every retrieval source was unavailable
    pub degraded: bool,
    /// Model failure, when the reply is an error message
    pub error: Option<Error>,
}

impl Reply {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Prompt built for one message, before the model is invoked
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub messages: Vec<PromptMessage>,
    pub outcome: RetrievalOutcome,
}

/// Retrieval-augmented assistant
pub struct Assistant {
    retriever: Retriever,
    compositor: ContextCompositor,
    history: HistoryStore,
    history_budget: usize,
    model: Arc<dyn ChatModel>,
    model_options: ModelOptions,
    model_timeout: Duration,
    store: Arc<dyn EpisodicStore>,
    health: Vec<Arc<dyn HealthCheck>>,
    background: BackgroundTasks,
    system_prompt: String,
    max_message_chars: usize,
    keepalive_interval: Duration,
}

impl Assistant {
    /// Build an assistant from configuration and explicit collaborators
    #[must_use]
    pub fn new(config: &Config, parts: AssistantParts) -> Self {
        let retriever = Retriever::new(parts.episodic, parts.knowledge)
            .with_timeout(config.retrieval.source_timeout);
        let compositor = ContextCompositor::new(
            vec![config.episodic_budget, config.knowledge_budget],
            config.retrieval.min_relevance,
        );

        Self {
            retriever,
            compositor,
            history: HistoryStore::new(config.history.max_pairs),
            history_budget: config.history.char_budget,
            model: parts.model,
            model_options: config.model_options,
            model_timeout: config.ollama_timeout,
            store: parts.store,
            health: parts.health,
            background: BackgroundTasks::new(),
            system_prompt: config.system_prompt.clone(),
            max_message_chars: config.max_message_chars,
            keepalive_interval: config.keepalive_interval,
        }
    }

    /// Build an assistant backed by the configured HTTP services
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let watcher = Arc::new(WatcherClient::from_config(config));
        let lor = Arc::new(LorClient::from_config(config));
        let ollama = Arc::new(OllamaClient::from_config(config));

        let health: Vec<Arc<dyn HealthCheck>> = vec![
            ollama.clone() as Arc<dyn HealthCheck>,
            watcher.clone() as Arc<dyn HealthCheck>,
            lor.clone() as Arc<dyn HealthCheck>,
        ];
        let parts = AssistantParts {
            episodic: watcher.clone(),
            knowledge: lor,
            model: ollama,
            store: watcher,
            health,
        };

        tracing::info!(
            model = %config.ollama_model,
            ollama = %config.ollama_url,
            watcher = %config.watcher_url,
            lor = %config.lor_url,
            "assistant configured"
        );

        Self::new(config, parts)
    }

    /// Handle one incoming message
    pub async fn handle_query(&self, conversation_id: &str, text: &str) -> Reply {
        self.handle_query_with(conversation_id, text, None).await
    }

    /// Handle one incoming message, pulsing `indicator` until the reply is ready
    ///
    /// On success the exchange is appended to the conversation history and
    /// persisted in the background. On model failure the reply carries a
    /// short error message, history is left untouched, and nothing is
    /// persisted.
    pub async fn handle_query_with(
        &self,
        conversation_id: &str,
        text: &str,
        indicator: Option<Arc<dyn KeepAlive>>,
    ) -> Reply {
        let heartbeat = indicator.map(|i| Heartbeat::start(i, self.keepalive_interval));

        let mut window = self.history.lock(conversation_id).await;
        let prepared = self.build_prompt(&window, text).await;
        let result = tokio::time::timeout(
            self.model_timeout,
            self.model.complete(&prepared.messages, &self.model_options),
        )
        .await
        .unwrap_or(Err(Error::ModelTimeout));

        if let Some(heartbeat) = heartbeat {
            heartbeat.stop().await;
        }

        let RetrievalOutcome {
            source_summary,
            degraded,
            ..
        } = prepared.outcome;

        match result {
            Ok(reply) => {
                window.push(text, reply.as_str());
                drop(window);

                tracing::info!(
                    conversation_id,
                    sources = %source_summary,
                    chars = reply.chars().count(),
                    degraded,
                    "exchange complete"
                );

                self.background.spawn_persist(
                    Arc::clone(&self.store),
                    Exchange::new(conversation_id, text, &reply, &source_summary),
                );

                Reply {
                    segments: split_message(&reply, self.max_message_chars),
                    text: reply,
                    sources: source_summary,
                    degraded,
                    error: None,
                }
            }
            Err(e) => {
                drop(window);
                tracing::error!(conversation_id, error = %e, "model invocation failed");

                let message = format!("Error: {e}");
                Reply {
                    segments: split_message(&message, self.max_message_chars),
                    text: message,
                    sources: source_summary,
                    degraded,
                    error: Some(e),
                }
            }
        }
    }

    /// Build the prompt for a message without invoking the model
    pub async fn prepare(&self, conversation_id: &str, text: &str) -> PreparedPrompt {
        let window = self.history.lock(conversation_id).await;
        self.build_prompt(&window, text).await
    }

    /// Retrieve and compose grounding context for a query
    pub async fn retrieve(&self, query: &str) -> RetrievalOutcome {
        let retrieval = self.retriever.aggregate(query).await;
        self.compositor.outcome(&retrieval)
    }

    async fn build_prompt(&self, window: &ConversationWindow, text: &str) -> PreparedPrompt {
        let outcome = self.retrieve(text).await;
        let history = window.slice(self.history_budget);

        tracing::debug!(
            sources = %outcome.source_summary,
            context_chars = outcome.context_text.chars().count(),
            history_turns = history.len(),
            "prompt assembled"
        );

        let messages = prompt::assemble(
            &self.system_prompt,
            &outcome.context_text,
            &history,
            text,
            outcome.degraded,
        );

        PreparedPrompt { messages, outcome }
    }

    /// Store a note in episodic memory
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyNote` for blank text, or `Error::Persistence`
    /// if the store rejects the write
    pub async fn remember(&self, note: &str) -> Result<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(Error::EmptyNote);
        }

        self.store.store_note(note).await?;
        tracing::info!(chars = note.chars().count(), "note remembered");
        Ok(())
    }

    /// Forget a conversation's short-term history
    pub async fn clear(&self, conversation_id: &str) -> bool {
        let cleared = self.history.clear(conversation_id).await;
        tracing::debug!(conversation_id, cleared, "history cleared");
        cleared
    }

    /// Service health plus cached history for one conversation
    pub async fn status(&self, conversation_id: &str) -> StatusReport {
        StatusReport {
            health: health::check_services(&self.health).await,
            model: self.model.model_id().to_string(),
            model_timeout: self.model_timeout,
            max_pairs: self.history.max_pairs(),
            cached_pairs: self.history.pair_count(conversation_id).await,
        }
    }

    /// Short-term history store
    #[must_use]
    pub const fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Number of background writes still running
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.background.pending()
    }

    /// Wait for in-flight background writes to finish
    pub async fn drain(&self) {
        self.background.drain().await;
    }
}
