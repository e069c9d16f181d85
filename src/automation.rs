//! Automation commands typed into the chat input with a leading `!`.

use chrono::Local;
use std::str::FromStr;
use strum::{EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::config::ModelInfo;
use crate::conversation::{Message, Role, WindowMessage, COMMAND_SIGIL};
use crate::prompts::{is_stop_message, SUMMARY_PROMPT};

/// Commands recognised after the `!` sigil. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum AutomationCommand {
    #[strum(serialize = "help", serialize = "bantuan")]
    Help,
    #[strum(serialize = "info_model", serialize = "model_info")]
    ModelInfo,
    #[strum(serialize = "waktu", serialize = "time")]
    CurrentTime,
    #[strum(serialize = "summarize_chat", serialize = "summarize")]
    Summarize,
}

impl AutomationCommand {
    /// Keywords accepted for this command, canonical one first.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            AutomationCommand::Help => &["help", "bantuan"],
            AutomationCommand::ModelInfo => &["info_model", "model_info"],
            AutomationCommand::CurrentTime => &["waktu", "time"],
            AutomationCommand::Summarize => &["summarize_chat", "summarize"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AutomationCommand::Help => "show this help",
            AutomationCommand::ModelInfo => "show the selected model",
            AutomationCommand::CurrentTime => "show the current time",
            AutomationCommand::Summarize => "summarize this conversation",
        }
    }
}

/// A model exchange queued by an automation command
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAutomation {
    pub request_window: Vec<WindowMessage>,
    pub model_id: String,
}

/// What the dispatcher decided for one input
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Answered locally
    Reply(String),
    /// No direct answer; run this exchange instead
    Queued(PendingAutomation),
}

pub fn is_automation(input: &str) -> bool {
    input.trim_start().starts_with(COMMAND_SIGIL)
}

pub fn help_text() -> String {
    let mut help = String::from("**Commands:**");
    for command in AutomationCommand::iter() {
        let keywords = command
            .keywords()
            .iter()
            .map(|k| format!("`!{k}`"))
            .collect::<Vec<_>>()
            .join("/");
        help.push_str(&format!("\n- {}: {}", keywords, command.description()));
    }
    help
}

/// Handle `raw_input` as an automation command against `history`, which
/// must not include the command message itself.
pub fn dispatch(raw_input: &str, model: &ModelInfo, history: &[Message]) -> Dispatch {
    let head = raw_input.split_whitespace().next().unwrap_or_default();
    let keyword = head.strip_prefix(COMMAND_SIGIL).unwrap_or(head);

    let Ok(command) = AutomationCommand::from_str(keyword) else {
        debug!(command = head, "unknown automation command");
        return Dispatch::Reply(format!(
            "Command '{}' not recognized. Type `!help`.",
            head.to_lowercase()
        ));
    };

    match command {
        AutomationCommand::Help => Dispatch::Reply(help_text()),
        AutomationCommand::ModelInfo => Dispatch::Reply(format!(
            "**Model info:**\n- Name: {}\n- ID: `{}`\n- Max tokens: {}\n- Vision: {}\n- Free: {}",
            model.name,
            model.id,
            model.max_tokens,
            if model.supports_vision { "yes" } else { "no" },
            if model.is_free { "yes" } else { "no" },
        )),
        AutomationCommand::CurrentTime => Dispatch::Reply(format!(
            "Server time: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )),
        AutomationCommand::Summarize => summarize(model, history),
    }
}

fn summarize(model: &ModelInfo, history: &[Message]) -> Dispatch {
    if history.is_empty() {
        return Dispatch::Reply("Chat history is empty.".to_string());
    }

    let transcript = history
        .iter()
        .filter(|m| !m.content.is_empty() && !is_stop_message(&m.content))
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    if transcript.trim().is_empty() {
        return Dispatch::Reply("No chat content to summarize.".to_string());
    }

    debug!(messages = history.len(), "queueing summary exchange");
    Dispatch::Queued(PendingAutomation {
        request_window: vec![
            WindowMessage::new(Role::System, SUMMARY_PROMPT),
            WindowMessage::new(Role::User, transcript),
        ],
        model_id: model.id.clone(),
    })
}
