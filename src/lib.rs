//! Second Gateway - Retrieval-augmented conversational gateway
//!
//! This library provides the core of the Second assistant:
//! - Concurrent retrieval from episodic memory and a knowledge base
//! - Relevance filtering and character-budgeted context composition
//! - Per-conversation history windows
//! - Prompt assembly and model invocation via Ollama
//! - Fire-and-forget persistence of completed exchanges
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Transport adapter (CLI, bot)           │
//! └────────────────────┬────────────────────────────────┘
//!                      │ conversation id + text
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Assistant                        │
//! │  Retriever │ Compositor │ History │ Prompt │ Split  │
//! └───────┬─────────────┬──────────────────┬────────────┘
//!         │             │                  │
//! ┌───────▼──────┐ ┌────▼─────────┐ ┌──────▼───────┐
//! │   Watcher    │ │     Lor      │ │    Ollama    │
//! │  (episodic)  │ │ (knowledge)  │ │   (model)    │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```

pub mod assistant;
pub mod chunking;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod keepalive;
pub mod llm;
pub mod persistence;
pub mod prompt;
pub mod retrieval;

pub use assistant::{Assistant, AssistantParts, PreparedPrompt, Reply};
pub use chunking::{MAX_MESSAGE_CHARS, split_message};
pub use config::Config;
pub use context::{
    ContextBudget, ContextCompositor, ConversationTurn, HistoryStore, truncate_at_sentence,
};
pub use error::{Error, Result};
pub use health::{HealthCheck, HealthReport, ServiceState, StatusReport};
pub use keepalive::{Heartbeat, KeepAlive};
pub use llm::{ChatModel, ModelOptions, OllamaClient};
pub use persistence::{BackgroundTasks, EpisodicStore, Exchange};
pub use prompt::{PromptMessage, Role};
pub use retrieval::{
    LorClient, RetrievalItem, RetrievalOutcome, Retriever, SearchSource, Source, SourceTag,
    WatcherClient,
};
