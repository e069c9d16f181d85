use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a line with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// List conversations
    List,
    /// Switch to another conversation
    Switch,
    /// Rename the current conversation
    Rename,
    /// Pin or unpin the current conversation
    Pin,
    /// Delete a conversation
    Delete,
    /// Export the current conversation
    Export,
    /// Import a transcript file
    Import,
    /// Ask again for the last message
    Regen,
    /// Switch to a different model
    Model,
    /// Switch to a different persona
    Persona,
    /// Show or replace the system prompt
    System,
    /// Set the sampling temperature
    Temp,
    /// Like the last reply
    Like,
    /// Dislike the last reply
    Dislike,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::List => "list conversations, pinned first",
            SlashCommand::Switch => "switch to conversation <n> from /list",
            SlashCommand::Rename => "rename the current conversation: /rename <title>",
            SlashCommand::Pin => "pin or unpin the current conversation",
            SlashCommand::Delete => "delete the current conversation, or <n> from /list",
            SlashCommand::Export => "export to <path> (.json, .txt, .md) or to a format name",
            SlashCommand::Import => "import a transcript from <path>",
            SlashCommand::Regen => "regenerate the reply to the last message",
            SlashCommand::Model => "list models, or switch with /model <name>",
            SlashCommand::Persona => "list personas, or switch with /persona <name>",
            SlashCommand::System => "show the system prompt, or replace it with /system <prompt>",
            SlashCommand::Temp => "set the temperature (0.0 to 1.0)",
            SlashCommand::Like => "like the last reply",
            SlashCommand::Dislike => "dislike the last reply",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether the command needs an argument to do anything.
    pub fn requires_argument(self) -> bool {
        matches!(
            self,
            SlashCommand::Switch
                | SlashCommand::Rename
                | SlashCommand::Export
                | SlashCommand::Import
                | SlashCommand::Temp
        )
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let (head, argument) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, Some(tail.trim())),
        None => (rest, None),
    };

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "exit" | "bye" => Some(SlashCommand::Quit),
            "h" | "?" => Some(SlashCommand::Help),
            "ls" => Some(SlashCommand::List),
            "regenerate" | "retry" => Some(SlashCommand::Regen),
            "temperature" => Some(SlashCommand::Temp),
            "models" => Some(SlashCommand::Model),
            "personas" => Some(SlashCommand::Persona),
            "prompt" => Some(SlashCommand::System),
            _ => None,
        })?;

    let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);
    Some(ParsedCommand { command, argument })
}

/// Resolve a `/switch` or `/delete` argument against the listed ids: either a
/// 1-based position in the list or a full conversation id.
pub fn resolve_conversation(argument: &str, listed_ids: &[String]) -> Option<String> {
    if let Ok(position) = argument.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| listed_ids.get(index))
            .cloned();
    }
    listed_ids.iter().find(|id| id.as_str() == argument).cloned()
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nAliases: /q for /quit, /ls for /list, /retry for /regen, /models for /model");
    help.push_str("\nPress Ctrl-C while a reply is streaming to stop it.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_argument() {
        let parsed = parse_slash_command("/rename  Rust lifetimes ").expect("command");
        assert_eq!(parsed.command, SlashCommand::Rename);
        assert_eq!(parsed.argument(), Some("Rust lifetimes"));
    }

    #[test]
    fn parses_aliases_and_case() {
        assert_eq!(parse_slash_command("/q").map(|p| p.command), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("/LIST").map(|p| p.command), Some(SlashCommand::List));
        assert_eq!(parse_slash_command("/retry").map(|p| p.command), Some(SlashCommand::Regen));
        assert_eq!(parse_slash_command("/prompt").map(|p| p.command), Some(SlashCommand::System));
    }

    #[test]
    fn system_prompt_keeps_its_full_text() {
        let parsed = parse_slash_command("/system You answer in haiku. Always.").expect("command");
        assert_eq!(parsed.command, SlashCommand::System);
        assert_eq!(parsed.argument(), Some("You answer in haiku. Always."));
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert_eq!(parse_slash_command("hello /new"), None);
        assert_eq!(parse_slash_command("/frobnicate"), None);
        assert_eq!(parse_slash_command("!help"), None);
    }

    #[test]
    fn resolves_conversation_by_position_or_id() {
        let ids = vec!["chat_a".to_string(), "chat_b".to_string()];
        assert_eq!(resolve_conversation("2", &ids), Some("chat_b".to_string()));
        assert_eq!(resolve_conversation("chat_a", &ids), Some("chat_a".to_string()));
        assert_eq!(resolve_conversation("0", &ids), None);
        assert_eq!(resolve_conversation("3", &ids), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for command in SlashCommand::iter() {
            assert!(help.contains(&format!("/{}", command.command())));
        }
    }
}
