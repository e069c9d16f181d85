//! JSON transcripts: an array of `{role, content_text, timestamp, feedback?}`.

use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use super::{timestamp, Decoded, WarningKind};
use crate::conversation::{Feedback, Message, Role};
use crate::error::ImportError;

#[derive(Serialize)]
struct JsonMessage<'a> {
    role: Role,
    content_text: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<Feedback>,
}

pub fn encode(messages: &[Message]) -> String {
    let items: Vec<JsonMessage<'_>> = messages
        .iter()
        .map(|m| JsonMessage {
            role: m.role,
            content_text: &m.content,
            timestamp: timestamp::format_json(&m.timestamp),
            feedback: m.feedback,
        })
        .collect();
    // Serializing plain strings and enums cannot fail.
    serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
}

fn preview(value: &Value) -> String {
    value.to_string().chars().take(100).collect()
}

pub fn decode(input: &str) -> Result<Decoded, ImportError> {
    let raw: Value = serde_json::from_str(input)?;
    let Value::Array(items) = raw else {
        return Err(ImportError::NotAList);
    };

    let mut decoded = Decoded::default();
    for (item, value) in items.iter().enumerate() {
        let Some(object) = value.as_object() else {
            decoded.warn(
                item,
                WarningKind::DroppedItem,
                format!("Invalid JSON item: {}", preview(value)),
            );
            continue;
        };

        let content = match object.get("content_text") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        };
        let (Some(role_value), Some(content), Some(ts_value)) =
            (object.get("role"), content, object.get("timestamp"))
        else {
            decoded.warn(
                item,
                WarningKind::DroppedItem,
                format!("Invalid JSON item: {}", preview(value)),
            );
            continue;
        };

        let role = match role_value.as_str().map(Role::from_str) {
            Some(Ok(role)) => role,
            _ => {
                decoded.warn(
                    item,
                    WarningKind::DroppedItem,
                    format!("Invalid role {role_value} skipped"),
                );
                continue;
            }
        };

        let timestamp = match timestamp::parse_json_value(ts_value) {
            Some(ts) => ts,
            None => {
                decoded.warn(
                    item,
                    WarningKind::TimestampFallback,
                    format!(
                        "Unrecognised JSON timestamp {}, using the current time",
                        preview(ts_value),
                    ),
                );
                Local::now()
            }
        };

        let feedback = object
            .get("feedback")
            .and_then(Value::as_str)
            .and_then(|text| Feedback::from_str(text).ok());

        decoded.messages.push(Message {
            role,
            content,
            timestamp,
            feedback,
        });
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bot_role_is_dropped_and_rest_survive() {
        let input = json!([
            {"role": "user", "content_text": "hi", "timestamp": "2024-01-01T10:00:00"},
            {"role": "bot", "content_text": "beep", "timestamp": "2024-01-01T10:00:01"},
            {"role": "assistant", "content_text": "hello", "timestamp": "2024-01-01 10:00:02"}
        ])
        .to_string();
        let decoded = decode(&input).expect("decode");
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[1].content, "hello");
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].item, 1);
        assert_eq!(decoded.warnings[0].kind, WarningKind::DroppedItem);
    }

    #[test]
    fn top_level_object_is_rejected() {
        assert!(matches!(decode(r#"{"role": "user"}"#), Err(ImportError::NotAList)));
        assert!(matches!(decode("not json"), Err(ImportError::Json(_))));
    }

    #[test]
    fn missing_or_null_content_drops_item() {
        let input = json!([
            {"role": "user", "timestamp": 0},
            {"role": "user", "content_text": null, "timestamp": 0},
            "just a string"
        ])
        .to_string();
        let decoded = decode(&input).expect("decode");
        assert!(decoded.messages.is_empty());
        assert_eq!(decoded.warnings.len(), 3);
    }

    #[test]
    fn unknown_timestamp_falls_back_to_now_with_warning() {
        let input = json!([{"role": "user", "content_text": 42, "timestamp": "sometime"}]).to_string();
        let decoded = decode(&input).expect("decode");
        assert_eq!(decoded.messages[0].content, "42");
        assert_eq!(decoded.warnings[0].kind, WarningKind::TimestampFallback);
    }

    #[test]
    fn feedback_is_carried_both_ways() {
        let mut message = Message::user("nice");
        message.feedback = Some(Feedback::Like);
        let encoded = encode(&[message]);
        assert!(encoded.contains(r#""feedback": "like""#));
        let decoded = decode(&encoded).expect("decode");
        assert_eq!(decoded.messages[0].feedback, Some(Feedback::Like));
    }

    #[test]
    fn feedback_is_omitted_when_unset() {
        let encoded = encode(&[Message::assistant("x")]);
        assert!(!encoded.contains("feedback"));
        assert!(encoded.contains(r#""content_text": "x""#));
    }
}
