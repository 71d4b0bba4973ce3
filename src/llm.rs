//! Language model invocation
//!
//! The gateway only shapes the model's input and consumes its text output.
//! [`OllamaClient`] talks to an Ollama-compatible `/api/chat` endpoint;
//! anything implementing [`ChatModel`] can stand in for it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::health::{self, HealthCheck, ServiceState};
use crate::prompt::PromptMessage;
use crate::{Config, Error, Result};

/// Default timeout for a chat completion
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Reply used when the model returns no message content
const EMPTY_REPLY: &str = "No response.";

/// Service name used in health reports
const NAME: &str = "ollama";

/// Sampling and context options for a completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    pub temperature: f32,
    pub repeat_penalty: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Context window size in tokens
    pub context_window: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            repeat_penalty: 1.1,
            max_tokens: 512,
            context_window: 2560,
        }
    }
}

/// A chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs and status output
    fn model_id(&self) -> &str;

    /// Run one completion over `messages`
    ///
    /// # Errors
    ///
    /// Returns `Error::ModelTimeout`, `Error::ModelUnreachable` or
    /// `Error::Model`; failures are never retried
    async fn complete(&self, messages: &[PromptMessage], options: &ModelOptions) -> Result<String>;
}

/// Request body for `POST /api/chat`
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    repeat_penalty: f32,
    num_predict: u32,
    num_ctx: u32,
}

impl From<&ModelOptions> for ChatOptions {
    fn from(options: &ModelOptions) -> Self {
        Self {
            temperature: options.temperature,
            repeat_penalty: options.repeat_penalty,
            num_predict: options.max_tokens,
            num_ctx: options.context_window,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an Ollama chat endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    health_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for `model` served at `base_url`
    #[must_use]
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: DEFAULT_MODEL_TIMEOUT,
            health_timeout: health::DEFAULT_PROBE_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from gateway configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.ollama_url, &config.ollama_model)
            .with_timeout(config.ollama_timeout)
            .with_health_timeout(config.health_timeout)
    }

    /// Set the completion timeout
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

/// Classify a transport failure into the model error taxonomy
fn classify(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ModelTimeout
    } else if err.is_connect() {
        Error::ModelUnreachable
    } else {
        Error::Model(err.to_string())
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[PromptMessage], options: &ModelOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: options.into(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!("{status}: {}", body.trim())));
        }

        let body: ChatResponse = response.json().await.map_err(|e| classify(&e))?;

        let reply = body
            .message
            .and_then(|m| m.content)
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        tracing::debug!(model = %self.model, chars = reply.chars().count(), "model replied");
        Ok(reply)
    }
}

#[async_trait]
impl HealthCheck for OllamaClient {
    fn service_name(&self) -> &'static str {
        NAME
    }

    async fn health(&self) -> ServiceState {
        health::probe(
            &self.client,
            &format!("{}/api/tags", self.base_url),
            self.health_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_map_to_ollama_names() {
        let options = ModelOptions::default();
        let json = serde_json::to_value(ChatOptions::from(&options)).unwrap();
        assert_eq!(json["num_predict"], 512);
        assert_eq!(json["num_ctx"], 2560);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn request_serializes_messages() {
        let messages = vec![PromptMessage::system("sys"), PromptMessage::user("hi")];
        let request = ChatRequest {
            model: "qwen3:14b",
            messages: &messages,
            stream: false,
            options: (&ModelOptions::default()).into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen3:14b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn missing_message_is_tolerated() {
        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(response.message.is_none());
    }
}
