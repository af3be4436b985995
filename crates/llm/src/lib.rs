//! Generation provider integration for Veritas.
//!
//! This crate provides a provider-agnostic abstraction over chat-style
//! Large Language Model APIs. The answering pipeline only sees the
//! `LlmClient` trait; concrete providers live in [`providers`].
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI and Groq chat completions
//!
//! # Example
//! ```no_run
//! use veritas_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
