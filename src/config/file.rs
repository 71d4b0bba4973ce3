//! TOML configuration file loading
//!
//! Supports `~/.config/second/config.toml` as a persistent config source.
//! Every field is optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SecondConfigFile {
    /// Model server settings
    #[serde(default)]
    pub ollama: OllamaFileConfig,

    /// Backing service endpoints
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Assistant identity and output
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Retrieval and context budgets
    #[serde(default)]
    pub retrieval: RetrievalFileConfig,

    /// Short-term history
    #[serde(default)]
    pub history: HistoryFileConfig,

    /// Sampling options passed to the model
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Background timeouts and intervals
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,
}

/// Model server configuration
#[derive(Debug, Default, Deserialize)]
pub struct OllamaFileConfig {
    /// Base URL (e.g. "http://localhost:11434")
    pub url: Option<String>,

    /// Model identifier (e.g. "qwen3:14b")
    pub model: Option<String>,

    /// Completion timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Backing service endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// Episodic memory service
    pub watcher_url: Option<String>,

    /// Knowledge-base service
    pub lor_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    pub system_prompt: Option<String>,
    /// `source` tag on stored events
    pub event_source: Option<String>,
    /// Author recorded on remembered notes
    pub note_author: Option<String>,
    /// Reply segment size, capped at 4096
    pub max_message_chars: Option<usize>,
}

/// Retrieval and context budget configuration
#[derive(Debug, Default, Deserialize)]
pub struct RetrievalFileConfig {
    /// Minimum relevance score, inclusive
    pub min_relevance: Option<f64>,
    pub source_timeout_secs: Option<u64>,
    pub episodic_limit: Option<usize>,
    pub knowledge_top_k: Option<usize>,
    pub episodic_budget: Option<usize>,
    pub episodic_item_chars: Option<usize>,
    pub knowledge_budget: Option<usize>,
    pub knowledge_item_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryFileConfig {
    /// Exchanges kept per conversation
    pub max_pairs: Option<usize>,
    /// Characters of history handed to the prompt
    pub char_budget: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    pub temperature: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub max_tokens: Option<u32>,
    pub context_window: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub persist_secs: Option<u64>,
    pub keepalive_secs: Option<u64>,
    pub health_secs: Option<u64>,
}

/// Parse a config file from TOML text
///
/// # Errors
///
/// Returns an error if the text is not valid TOML for this schema
pub fn parse_config(content: &str) -> Result<SecondConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `SecondConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SecondConfigFile {
    config_file_path().map_or_else(SecondConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> SecondConfigFile {
    if !path.exists() {
        return SecondConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SecondConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SecondConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/second/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("second").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.ollama.url.is_none());
        assert!(config.history.max_pairs.is_none());
    }

    #[test]
    fn partial_sections_parse() {
        let config = parse_config(
            r#"
            [ollama]
            model = "llama3:8b"
            timeout_secs = 60

            [retrieval]
            min_relevance = 0.5
            knowledge_top_k = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.ollama.model.as_deref(), Some("llama3:8b"));
        assert_eq!(config.ollama.timeout_secs, Some(60));
        assert_eq!(config.retrieval.knowledge_top_k, Some(4));
        assert!(config.services.watcher_url.is_none());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse_config("[ollama\nurl = 1").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_from(Path::new("/nonexistent/second/config.toml"));
        assert!(config.ollama.url.is_none());
    }
}
