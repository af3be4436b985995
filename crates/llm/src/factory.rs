//! LLM provider factory.
//!
//! This module provides a factory for creating LLM clients based on
//! application configuration.

use crate::client::LlmClient;
use crate::providers::openai::{GROQ_BASE_URL, OPENAI_BASE_URL};
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (for providers that require it)
///
/// # Returns
/// A shared trait object implementing `LlmClient`
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - Required secrets are missing
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        ProviderType::OpenAI | ProviderType::Groq => {
            let key = api_key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| format!("{} provider requires API key", provider_type.as_str()))?;
            let default_url = if provider_type == ProviderType::Groq {
                GROQ_BASE_URL
            } else {
                OPENAI_BASE_URL
            };
            Ok(Arc::new(OpenAiClient::new(
                provider_type.as_str(),
                endpoint.unwrap_or(default_url),
                key,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_groq_requires_api_key() {
        match create_client("groq", None, None) {
            Err(err) => assert!(err.contains("groq provider requires API key")),
            Ok(_) => panic!("Expected error for Groq without API key"),
        }
    }

    #[test]
    fn test_create_groq_client() {
        let client = create_client("groq", None, Some("gsk_test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
