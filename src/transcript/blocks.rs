//! Shared decoding for the two delimited text formats.

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

use super::timestamp;
use super::{Decoded, ImportWarning, WarningKind};
use crate::conversation::{Message, Role};

/// Header grammar of one delimited format: a full-timestamp pattern and a
/// time-only pattern, each capturing (timestamp, role, content).
pub(super) struct Grammar {
    pub name: &'static str,
    pub full: &'static Regex,
    pub time_only: &'static Regex,
}

impl Grammar {
    /// Whether `line` opens a new message.
    pub fn is_header(&self, line: &str) -> bool {
        self.full.is_match(line) || self.time_only.is_match(line)
    }

    /// Split `input` into blocks. A line for which `is_separator` holds ends
    /// the current block only when the next line is a header; any other
    /// separator line is part of the message text.
    pub fn split_blocks(&self, input: &str, is_separator: impl Fn(&str) -> bool) -> Vec<String> {
        let lines: Vec<&str> = input.lines().map(|l| l.trim_end_matches('\r')).collect();
        let mut blocks = vec![String::new()];

        for (index, &line) in lines.iter().enumerate() {
            let next_is_header = lines
                .get(index + 1)
                .is_some_and(|&next| self.is_header(next));
            if is_separator(line) && next_is_header {
                blocks.push(String::new());
                continue;
            }
            if let Some(block) = blocks.last_mut() {
                block.push_str(line);
                block.push('\n');
            }
        }
        blocks
    }
}

/// `User` maps to user; every other accepted role token maps to assistant.
fn map_role(token: &str) -> Role {
    if token.eq_ignore_ascii_case("user") {
        Role::User
    } else {
        Role::Assistant
    }
}

fn preview(block: &str) -> String {
    block.chars().take(100).collect()
}

pub(super) fn decode_blocks<'a>(
    blocks: impl IntoIterator<Item = &'a str>,
    grammar: &Grammar,
    today: NaiveDate,
) -> Decoded {
    let mut decoded = Decoded::default();

    for (item, block) in blocks.into_iter().enumerate() {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let (timestamp, role, content) = if let Some(caps) = grammar.full.captures(block) {
            let Some(ts) = timestamp::parse_full(&caps[1]) else {
                decoded.warn(
                    item,
                    WarningKind::DroppedItem,
                    format!("{} timestamp '{}' is not valid", grammar.name, &caps[1]),
                );
                continue;
            };
            (ts, map_role(&caps[2]), caps[3].trim().to_string())
        } else if let Some(caps) = grammar.time_only.captures(block) {
            let Some(ts) = timestamp::parse_time_on(&caps[1], today) else {
                decoded.warn(
                    item,
                    WarningKind::DroppedItem,
                    format!("{} time '{}' is not valid", grammar.name, &caps[1]),
                );
                continue;
            };
            decoded.warn(
                item,
                WarningKind::DateAssumed,
                format!("{} timestamp ({}) uses today's date", grammar.name, &caps[1]),
            );
            (ts, map_role(&caps[2]), caps[3].trim().to_string())
        } else {
            warn!(format = grammar.name, item, "unrecognised transcript block");
            decoded.warn(
                item,
                WarningKind::DroppedItem,
                format!("{} format not recognised: {}", grammar.name, preview(block)),
            );
            continue;
        };

        decoded.messages.push(Message::new(role, content, timestamp));
    }

    decoded
}

impl Decoded {
    pub(super) fn warn(&mut self, item: usize, kind: WarningKind, message: String) {
        self.warnings.push(ImportWarning { item, kind, message });
    }
}
