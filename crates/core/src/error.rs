//! Error types for Veritas.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, generation providers,
//! knowledge stores, live search, prompts and the admission queue.

use thiserror::Error;

/// Unified error type for Veritas.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generation provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Provider rejected the call because of rate limiting (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider or adapter call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Knowledge store errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Live web search errors
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Rule table and validation setup errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Admission queue errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RateLimited(_) | AppError::Timeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
