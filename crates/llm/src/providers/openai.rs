//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol,
//! which covers OpenAI itself and Groq.

use crate::client::{
    map_status_error, map_transport_error, ChatMessage, LlmClient, LlmRequest, LlmResponse,
    LlmUsage,
};
use serde::{Deserialize, Serialize};
use veritas_core::{AppError, AppResult};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for the given provider name, base URL and key.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn convert_response(&self, response: ChatCompletionResponse) -> AppResult<LlmResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Llm(format!("{} returned no choices", self.name)))?;

        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: response.model,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            "Sending chat completion to {} ({} messages)",
            self.name,
            request.messages.len()
        );

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(&self.name, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(&self.name, status, error_text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            AppError::Llm(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        self.convert_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_skips_unset() {
        let messages = vec![ChatMessage::user("hi")];
        let body = ChatCompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: &messages,
            temperature: Some(0.0),
            top_p: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("top_p").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_conversion() {
        let client = OpenAiClient::new("groq", GROQ_BASE_URL, "key");
        let body = r#"{
            "model": "llama-3.3-70b-versatile",
            "choices": [{"message": {"role": "assistant", "content": "Hi [Web]"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        let response = client.convert_response(parsed).unwrap();
        assert_eq!(response.content, "Hi [Web]");
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[test]
    fn test_empty_choices_is_error() {
        let client = OpenAiClient::new("openai", OPENAI_BASE_URL, "key");
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"model": "gpt-4o-mini", "choices": []}"#).unwrap();
        assert!(client.convert_response(parsed).is_err());
    }
}
