//! Core `LlmClient` trait and `ApiClient` implementation.
//!
//! `ApiClient` calls any OpenAI-compatible `/chat/completions` endpoint:
//! Gemini (OpenAI mode), OpenAI, Groq, Ollama, LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during a completion request.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// Speaker of a chat-completions message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the OpenAI chat wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmClient trait
// ---------------------------------------------------------------------------

/// Async trait for a chat-completions backend.
///
/// Implementors must be `Send + Sync` so they can be shared across sessions
/// (e.g. wrapped in `Arc<dyn LlmClient>`).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct ApiClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl ApiClient {
    /// Build an `ApiClient` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default client is used as a last-resort
    /// fallback if the builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: config.resolve_api_key(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmClient for ApiClient {
    /// Send `messages` to the configured endpoint and return the first
    /// choice's content.
    ///
    /// The `Authorization: Bearer …` header is attached only when a key
    /// resolved at construction time.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model":       self.config.model,
            "messages":    messages,
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
