use chrono::{DateTime, Local};

use crate::prompts::{INITIAL_CHAT_PREFIX, NEW_CHAT_PREFIX, UPLOAD_PREFIX};

const TITLE_WORDS: usize = 5;

/// Titles assigned at creation time that auto-derivation may replace with a
/// generic label.
pub fn is_placeholder(title: &str) -> bool {
    title.starts_with(NEW_CHAT_PREFIX)
        || title.starts_with(UPLOAD_PREFIX)
        || title.starts_with(INITIAL_CHAT_PREFIX)
}

pub fn default_title(prefix: &str, at: DateTime<Local>) -> String {
    format!("{} ({})", prefix, at.format("%H:%M:%S"))
}

/// Derive a conversation title from a user message.
///
/// Returns `None` when the current title should be kept.
pub fn derive_title(content: &str, current: &str, created_at: DateTime<Local>) -> Option<String> {
    let words: Vec<&str> = content.split_whitespace().collect();

    if words.len() < 2 && is_placeholder(current) {
        return Some(format!("Chat ({})", created_at.format("%H:%M:%S")));
    }
    if words.is_empty() {
        return None;
    }

    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str("...");
    }
    Some(title)
}
