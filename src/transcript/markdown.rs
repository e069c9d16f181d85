//! Markdown transcripts: `*<timestamp>* - **<Role>**:` headers, content on the
//! following lines, blocks separated by a line holding exactly `---` that is
//! followed by a header.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::blocks::{decode_blocks, Grammar};
use super::{timestamp, Decoded};
use crate::conversation::Message;

pub const SEPARATOR: &str = "---";

static FULL_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\*(\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2})\*\s*-\s*\*\*(User|Assistant|System|Bot)\*\*:[ \t]*\n?([\s\S]*)$",
    )
    .expect("valid Markdown pattern")
});

static TIME_ONLY_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\*(\d{2}:\d{2}:\d{2})\*\s*-\s*\*\*(User|Assistant|System|Bot)\*\*:[ \t]*\n?([\s\S]*)$",
    )
    .expect("valid Markdown pattern")
});

pub fn encode(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "*{}* - **{}**:\n{}\n",
                timestamp::format_export(&m.timestamp),
                m.role.label(),
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join(&format!("\n{SEPARATOR}\n"))
}

pub fn decode(input: &str, today: NaiveDate) -> Decoded {
    let grammar = Grammar {
        name: "MD",
        full: &FULL_TS,
        time_only: &TIME_ONLY_TS,
    };
    let blocks = grammar.split_blocks(input, |line| line == SEPARATOR);
    decode_blocks(blocks.iter().map(String::as_str), &grammar, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::transcript::WarningKind;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).expect("date")
    }

    #[test]
    fn decodes_blocks_between_separators() {
        let input = "*2024-01-01 10:00:00* - **User**:\nHello\n\n---\n*2024-01-01 10:00:05* - **Assistant**:\nHi there\nsecond line\n";
        let decoded = decode(input, today());
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[0].content, "Hello");
        assert_eq!(decoded.messages[1].role, Role::Assistant);
        assert_eq!(decoded.messages[1].content, "Hi there\nsecond line");
    }

    #[test]
    fn header_and_content_may_share_a_line() {
        let decoded = decode("*10:00:00* - **bot**: inline", today());
        assert_eq!(decoded.messages[0].content, "inline");
        assert_eq!(decoded.warnings[0].kind, WarningKind::DateAssumed);
    }

    #[test]
    fn horizontal_rules_inside_text_need_the_exact_line() {
        let input = "*2024-01-01 10:00:00* - **User**:\na --- b\n";
        let decoded = decode(input, today());
        assert_eq!(decoded.messages[0].content, "a --- b");
    }

    #[test]
    fn rule_lines_inside_a_message_are_kept() {
        let input = "*2024-01-01 10:00:00* - **Assistant**:\nabove\n\n---\n\nbelow\n\n---\n*2024-01-01 10:00:05* - **User**:\nok\n";
        let decoded = decode(input, today());
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[0].content, "above\n\n---\n\nbelow");
        assert_eq!(decoded.messages[1].content, "ok");
    }

    #[test]
    fn unrecognised_block_is_dropped() {
        let input = "# Heading\n---\n*2024-01-01 10:00:00* - **User**:\nok\n";
        let decoded = decode(input, today());
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].kind, WarningKind::DroppedItem);
    }
}
