//! Plain-text transcripts: `[<timestamp>] <Role>: <content>` blocks separated
//! by a blank line. Blank lines not followed by a header belong to the
//! message text.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::blocks::{decode_blocks, Grammar};
use super::{timestamp, Decoded};
use crate::conversation::Message;

static FULL_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[(\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2})\]\s*(User|Assistant|System|Bot):\s*([\s\S]*)$")
        .expect("valid TXT pattern")
});

static TIME_ONLY_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[(\d{2}:\d{2}:\d{2})\]\s*(User|Assistant|System|Bot):\s*([\s\S]*)$")
        .expect("valid TXT pattern")
});

pub fn encode(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                timestamp::format_export(&m.timestamp),
                m.role.label(),
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn decode(input: &str, today: NaiveDate) -> Decoded {
    let grammar = Grammar {
        name: "TXT",
        full: &FULL_TS,
        time_only: &TIME_ONLY_TS,
    };
    let blocks = grammar.split_blocks(input, |line| line.trim().is_empty());
    decode_blocks(blocks.iter().map(String::as_str), &grammar, today)
}
