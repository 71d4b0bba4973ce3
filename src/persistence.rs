//! Long-term persistence of completed exchanges
//!
//! Writing an exchange to episodic memory is fire-and-forget: it runs as a
//! detached task after the reply is ready, its failure is logged and
//! dropped, and it is never retried. An exchange that fails to persist is
//! lost from long-term memory but stays in the in-process history window.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::Result;

/// Characters of each turn copied into exchange metadata
pub const METADATA_EXCERPT_CHARS: usize = 500;

/// Decay policy tag attached to stored exchanges
pub const DECAY_POLICY: &str = "standard";

/// A completed exchange ready to be written to episodic memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub id: Uuid,
    pub conversation_id: String,
    pub user_text: String,
    pub assistant_text: String,
    /// Source summary of the context used to answer
    pub context_sources: String,
    pub recorded_at: DateTime<Utc>,
}

impl Exchange {
    /// Record an exchange now with a fresh id
    #[must_use]
    pub fn new(
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
        context_sources: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            context_sources: context_sources.to_string(),
            recorded_at: Utc::now(),
        }
    }

    /// Episode content in question/answer form
    #[must_use]
    pub fn content(&self) -> String {
        format!("Q: {}\nA: {}", self.user_text, self.assistant_text)
    }

    /// Metadata stored alongside the episode
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "user_message": excerpt(&self.user_text),
            "assistant_response": excerpt(&self.assistant_text),
            "context_sources": self.context_sources,
            "conversation_id": self.conversation_id,
            "exchange_id": self.id.to_string(),
            "recorded_at": self.recorded_at.to_rfc3339(),
            "decay_policy": DECAY_POLICY,
        })
    }
}

/// First [`METADATA_EXCERPT_CHARS`] characters of `text`
fn excerpt(text: &str) -> String {
    text.chars().take(METADATA_EXCERPT_CHARS).collect()
}

/// Write side of the episodic memory service
#[async_trait]
pub trait EpisodicStore: Send + Sync {
    /// Store a completed exchange
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the write fails
    async fn store_exchange(&self, exchange: &Exchange) -> Result<()>;

    /// Store a free-form note
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the write fails
    async fn store_note(&self, note: &str) -> Result<()>;
}

/// Registry of in-flight fire-and-forget tasks
///
/// Holds handles so pending writes can be counted and awaited on shutdown.
/// Finished handles are reaped whenever a new task is spawned.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundTasks {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist an exchange in the background
    ///
    /// The outcome is only logged; nothing awaits it on the reply path.
    pub fn spawn_persist(&self, store: Arc<dyn EpisodicStore>, exchange: Exchange) {
        let handle = tokio::spawn(async move {
            match store.store_exchange(&exchange).await {
                Ok(()) => tracing::info!(
                    exchange_id = %exchange.id,
                    sources = %exchange.context_sources,
                    "stored conversation in episodic memory"
                ),
                Err(e) => tracing::error!(
                    exchange_id = %exchange.id,
                    error = %e,
                    "failed to store conversation in episodic memory"
                ),
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks that have not finished yet
    #[must_use]
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every registered task to finish
    pub async fn drain(&self) {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "background task failed");
            }
        }
    }
}
