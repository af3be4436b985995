//! LLM client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with LLM providers.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use veritas_core::{AppError, AppResult};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Model identifier (e.g., "llama3.2", "llama-3.3-70b-versatile")
    pub model: String,

    /// Ordered conversation, system message first
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p nucleus sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Per-request HTTP timeout
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set nucleus sampling.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Total characters across all messages, used for token estimates.
    pub fn content_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for generation providers.
///
/// This trait abstracts the underlying provider (Ollama, OpenAI, Groq, ...).
/// Implementations must map HTTP 429 to `AppError::RateLimited` and request
/// timeouts to `AppError::Timeout` so callers can classify failures.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "groq").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming chat completion.
    ///
    /// # Arguments
    /// * `request` - The completion request
    ///
    /// # Returns
    /// The complete LLM response
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

/// Map a reqwest transport error to the workspace error type.
pub(crate) fn map_transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("{} request timed out: {}", provider, err))
    } else {
        AppError::Llm(format!("Failed to send request to {}: {}", provider, err))
    }
}

/// Turn a non-success HTTP status into the workspace error type.
pub(crate) fn map_status_error(
    provider: &str,
    status: reqwest::StatusCode,
    body: String,
) -> AppError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AppError::RateLimited(format!("{} API rate limit ({}): {}", provider, status, body))
    } else if status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::GATEWAY_TIMEOUT
    {
        AppError::Timeout(format!("{} API timeout ({}): {}", provider, status, body))
    } else {
        AppError::Llm(format!("{} API error ({}): {}", provider, status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new(
            "llama3.2",
            vec![ChatMessage::system("rules"), ChatMessage::user("question")],
        )
        .with_temperature(0.0)
        .with_top_p(0.9)
        .with_max_tokens(2000);

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.content_chars(), 13);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_status_mapping() {
        let err = map_status_error("groq", reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(err, AppError::RateLimited(_)));

        let err = map_status_error("groq", reqwest::StatusCode::GATEWAY_TIMEOUT, String::new());
        assert!(matches!(err, AppError::Timeout(_)));

        let err = map_status_error("groq", reqwest::StatusCode::BAD_REQUEST, "bad".to_string());
        assert!(matches!(err, AppError::Llm(_)));
    }
}
