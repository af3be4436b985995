//! Prompt system for Veritas.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (built in, overridable per workspace)
//! - Handlebars rendering of separate system and user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{load_prompt, ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, PromptDefinition};
