//! Configuration management for the Second gateway

pub mod file;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::chunking::MAX_MESSAGE_CHARS;
use crate::context::{ContextBudget, HISTORY_CHAR_BUDGET, MAX_HISTORY_TURNS};
use crate::llm::{DEFAULT_MODEL_TIMEOUT, ModelOptions};
use crate::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::retrieval::{DEFAULT_SOURCE_TIMEOUT, MIN_RELEVANCE_SCORE};
use crate::{Error, Result};

use self::file::SecondConfigFile;

/// Default model server URL
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model identifier
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:14b";

/// Default episodic memory service URL
pub const DEFAULT_WATCHER_URL: &str = "http://localhost:9100";

/// Default knowledge-base service URL
pub const DEFAULT_LOR_URL: &str = "http://localhost:9000";

/// Default `source` tag on stored events
pub const DEFAULT_EVENT_SOURCE: &str = "second";

/// Default author recorded on remembered notes
pub const DEFAULT_NOTE_AUTHOR: &str = "owner";

/// Second gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model server base URL
    pub ollama_url: String,

    /// Model identifier for chat completions
    pub ollama_model: String,

    /// Completion timeout
    pub ollama_timeout: Duration,

    /// Episodic memory service base URL
    pub watcher_url: String,

    /// Knowledge-base service base URL
    pub lor_url: String,

    /// System instruction sent with every exchange
    pub system_prompt: String,

    /// `source` tag on events written to episodic memory
    pub event_source: String,

    /// Author recorded on remembered notes
    pub note_author: String,

    /// Retrieval tuning
    pub retrieval: RetrievalConfig,

    /// Budget for episodic memory context
    pub episodic_budget: ContextBudget,

    /// Budget for knowledge-base context
    pub knowledge_budget: ContextBudget,

    /// Short-term history limits
    pub history: HistoryConfig,

    /// Sampling options for the model
    pub model_options: ModelOptions,

    /// Maximum characters per transmitted reply segment
    pub max_message_chars: usize,

    /// Timeout for writes to episodic memory
    pub persist_timeout: Duration,

    /// Interval between keep-alive pulses
    pub keepalive_interval: Duration,

    /// Timeout for each health probe
    pub health_timeout: Duration,
}

/// Retrieval tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    /// Minimum relevance score, inclusive
    pub min_relevance: f64,

    /// Timeout for each source query
    pub source_timeout: Duration,

    /// Episodes requested per search
    pub episodic_limit: usize,

    /// Knowledge results requested per search
    pub knowledge_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_relevance: MIN_RELEVANCE_SCORE,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            episodic_limit: 5,
            knowledge_top_k: 3,
        }
    }
}

/// Short-term history limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Exchanges kept per conversation
    pub max_pairs: usize,

    /// Characters of history handed to the prompt
    pub char_budget: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_pairs: MAX_HISTORY_TURNS,
            char_budget: HISTORY_CHAR_BUDGET,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_timeout: DEFAULT_MODEL_TIMEOUT,
            watcher_url: DEFAULT_WATCHER_URL.to_string(),
            lor_url: DEFAULT_LOR_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            note_author: DEFAULT_NOTE_AUTHOR.to_string(),
            retrieval: RetrievalConfig::default(),
            episodic_budget: ContextBudget::episodic(),
            knowledge_budget: ContextBudget::knowledge(),
            history: HistoryConfig::default(),
            model_options: ModelOptions::default(),
            max_message_chars: MAX_MESSAGE_CHARS,
            persist_timeout: Duration::from_secs(10),
            keepalive_interval: crate::keepalive::DEFAULT_PULSE_INTERVAL,
            health_timeout: crate::health::DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable holds an unparsable value
    pub fn load() -> Result<Self> {
        // Load optional TOML config file (env > toml > default)
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a config file overlay and an environment lookup
    ///
    /// Empty environment values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a numeric environment variable can't be parsed
    pub fn from_sources<F>(fc: SecondConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let ollama_url = env("OLLAMA_URL")
            .or(fc.ollama.url)
            .unwrap_or(defaults.ollama_url);
        let ollama_model = env("OLLAMA_MODEL")
            .or(fc.ollama.model)
            .unwrap_or(defaults.ollama_model);
        let ollama_timeout = parse_var(env("OLLAMA_TIMEOUT"), "OLLAMA_TIMEOUT")?
            .or(fc.ollama.timeout_secs)
            .map_or(defaults.ollama_timeout, Duration::from_secs);

        let watcher_url = env("WATCHER_URL")
            .or(fc.services.watcher_url)
            .unwrap_or(defaults.watcher_url);
        let lor_url = env("LOR_URL")
            .or(fc.services.lor_url)
            .unwrap_or(defaults.lor_url);

        let system_prompt = env("SECOND_SYSTEM_PROMPT")
            .or(fc.assistant.system_prompt)
            .unwrap_or(defaults.system_prompt);
        let event_source = env("SECOND_EVENT_SOURCE")
            .or(fc.assistant.event_source)
            .unwrap_or(defaults.event_source);

        let r = fc.retrieval;
        let retrieval = RetrievalConfig {
            min_relevance: r.min_relevance.unwrap_or(defaults.retrieval.min_relevance),
            source_timeout: r
                .source_timeout_secs
                .map_or(defaults.retrieval.source_timeout, Duration::from_secs),
            episodic_limit: r.episodic_limit.unwrap_or(defaults.retrieval.episodic_limit),
            knowledge_top_k: r.knowledge_top_k.unwrap_or(defaults.retrieval.knowledge_top_k),
        };

        let episodic_budget = ContextBudget {
            max_chars: r.episodic_budget.unwrap_or(defaults.episodic_budget.max_chars),
            item_chars: r
                .episodic_item_chars
                .unwrap_or(defaults.episodic_budget.item_chars),
            ..defaults.episodic_budget
        };
        let knowledge_budget = ContextBudget {
            max_chars: r.knowledge_budget.unwrap_or(defaults.knowledge_budget.max_chars),
            item_chars: r
                .knowledge_item_chars
                .unwrap_or(defaults.knowledge_budget.item_chars),
            ..defaults.knowledge_budget
        };

        let history = HistoryConfig {
            max_pairs: fc.history.max_pairs.unwrap_or(defaults.history.max_pairs),
            char_budget: fc.history.char_budget.unwrap_or(defaults.history.char_budget),
        };

        let m = fc.model;
        let model_options = ModelOptions {
            temperature: m.temperature.unwrap_or(defaults.model_options.temperature),
            repeat_penalty: m
                .repeat_penalty
                .unwrap_or(defaults.model_options.repeat_penalty),
            max_tokens: m.max_tokens.unwrap_or(defaults.model_options.max_tokens),
            context_window: m
                .context_window
                .unwrap_or(defaults.model_options.context_window),
        };

        let t = fc.timeouts;

        Ok(Self {
            ollama_url: normalize_url(&ollama_url),
            ollama_model,
            ollama_timeout,
            watcher_url: normalize_url(&watcher_url),
            lor_url: normalize_url(&lor_url),
            system_prompt,
            event_source,
            note_author: fc.assistant.note_author.unwrap_or(defaults.note_author),
            retrieval,
            episodic_budget,
            knowledge_budget,
            history,
            model_options,
            // Transport cap; a larger configured value is clamped down
            max_message_chars: fc
                .assistant
                .max_message_chars
                .map_or(defaults.max_message_chars, |n| n.min(MAX_MESSAGE_CHARS)),
            persist_timeout: t
                .persist_secs
                .map_or(defaults.persist_timeout, Duration::from_secs),
            keepalive_interval: t
                .keepalive_secs
                .map_or(defaults.keepalive_interval, Duration::from_secs),
            health_timeout: t
                .health_secs
                .map_or(defaults.health_timeout, Duration::from_secs),
        })
    }
}

/// Parse an optional environment value
fn parse_var<T>(value: Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={v}: {e}")))
        })
        .transpose()
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
