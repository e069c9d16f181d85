//! Messages stored in a conversation thread

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Role in conversation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Capitalized label used by the text transcript formats.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// User reaction attached to a delivered message
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Feedback {
    Like,
    Dislike,
    #[default]
    None,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub feedback: Option<Feedback>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            feedback: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Local::now())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Local::now())
    }
}

/// Message in the shape sent to the completions endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMessage {
    pub role: Role,
    pub content: String,
}

impl WindowMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for WindowMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Build the request window: the system prompt followed by the last `limit`
/// messages of `history`, each reduced to role and content.
pub fn request_window(history: &[Message], system_prompt: &str, limit: usize) -> Vec<WindowMessage> {
    let start = history.len().saturating_sub(limit);
    std::iter::once(WindowMessage::new(Role::System, system_prompt))
        .chain(history[start..].iter().map(WindowMessage::from))
        .collect()
}
