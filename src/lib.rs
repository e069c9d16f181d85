//! Terminal chat client for OpenAI-compatible streaming completion gateways.

pub mod automation;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod streaming;
pub mod transcript;
pub mod ui;

pub use config::Config;
pub use session::ChatSession;
