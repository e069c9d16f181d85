//! Transcript import/export in JSON, TXT and Markdown.
//!
//! Encoding is infallible. Decoding tolerates bad items: each one is dropped
//! and reported as an [`ImportWarning`], and only a wrong container shape
//! fails the whole decode. Decoded timestamps are always fully resolved
//! local instants; the time-only TXT/Markdown form is completed with a
//! caller-supplied date at this boundary.

mod blocks;
pub mod json;
pub mod markdown;
pub mod timestamp;
pub mod txt;

use chrono::{Local, NaiveDate};
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::conversation::Message;
use crate::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum TranscriptFormat {
    #[strum(serialize = "json")]
    Json,
    #[strum(serialize = "txt")]
    Txt,
    #[strum(serialize = "md", serialize = "markdown")]
    Markdown,
}

impl TranscriptFormat {
    /// Pick a format from a file name's extension.
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_str(extension).map_err(|_| ImportError::UnsupportedFormat(extension.to_lowercase()))
    }

    pub fn extension(self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The item was not imported.
    DroppedItem,
    /// The item was imported with the current time as its timestamp.
    TimestampFallback,
    /// A time-only stamp was completed with the import date.
    DateAssumed,
}

/// Recoverable problem with one transcript item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    /// Zero-based position of the item in the source.
    pub item: usize,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub messages: Vec<Message>,
    pub warnings: Vec<ImportWarning>,
}

pub fn encode(messages: &[Message], format: TranscriptFormat) -> String {
    match format {
        TranscriptFormat::Json => json::encode(messages),
        TranscriptFormat::Txt => txt::encode(messages),
        TranscriptFormat::Markdown => markdown::encode(messages),
    }
}

/// Decode using today's local date for time-only stamps.
pub fn decode(input: &str, format: TranscriptFormat) -> Result<Decoded, ImportError> {
    decode_on(input, format, Local::now().date_naive())
}

pub fn decode_on(
    input: &str,
    format: TranscriptFormat,
    today: NaiveDate,
) -> Result<Decoded, ImportError> {
    match format {
        TranscriptFormat::Json => json::decode(input),
        TranscriptFormat::Txt => Ok(txt::decode(input, today)),
        TranscriptFormat::Markdown => Ok(markdown::decode(input, today)),
    }
}
