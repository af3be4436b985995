//! Veritas Core Library
//!
//! This crate provides the foundational utilities shared by every Veritas crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (`AppConfig`, `PipelineSettings`)
//! - Non-blocking retry backoff

pub mod backoff;
pub mod config;
pub mod error;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use backoff::Backoff;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use settings::PipelineSettings;
