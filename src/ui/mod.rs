//! Terminal front end

pub mod commands;
pub mod repl;

pub use commands::{get_help_text, parse_slash_command, ParsedCommand, SlashCommand};
pub use repl::{ChatRepl, ReplAction};
