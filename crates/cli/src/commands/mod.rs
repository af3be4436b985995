//! Command handlers.

pub mod ask;
pub mod chat;

pub use ask::AskCommand;
pub use chat::ChatCommand;
