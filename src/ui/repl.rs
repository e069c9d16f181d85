use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::conversation::{Feedback, Role};
use crate::events::{PreparedExchange, SessionCommand, SessionOutcome};
use crate::llm::ModelBackend;
use crate::session::ChatSession;
use crate::streaming::ExchangeStatus;
use crate::transcript::TranscriptFormat;
use crate::ui::commands::{get_help_text, parse_slash_command, resolve_conversation, ParsedCommand, SlashCommand};

/// What the loop should do after a line was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplAction {
    Continue,
    Exit,
}

/// Line-oriented chat front end over a [`ChatSession`]
pub struct ChatRepl<B: ModelBackend> {
    session: ChatSession,
    backend: B,
}

impl<B: ModelBackend> ChatRepl<B> {
    pub fn new(session: ChatSession, backend: B) -> Self {
        Self { session, backend }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Read lines from stdin until `/quit`, end of input or Ctrl-C at the prompt.
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            prompt()?;
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read user input")?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!();
                break;
            };

            if self.handle_line(&line).await? == ReplAction::Exit {
                break;
            }
        }

        println!("👋 Bye!");
        Ok(())
    }

    /// Handle one line of input: a slash command or a chat message.
    pub async fn handle_line(&mut self, line: &str) -> Result<ReplAction> {
        if let Some(parsed) = parse_slash_command(line) {
            return self.handle_slash_command(parsed).await;
        }
        if line.trim_start().starts_with('/') {
            println!("❓ Unknown command. Type /help for the list.");
            return Ok(ReplAction::Continue);
        }

        self.apply(SessionCommand::Submit(line.to_string())).await?;
        Ok(ReplAction::Continue)
    }

    async fn handle_slash_command(&mut self, parsed: ParsedCommand) -> Result<ReplAction> {
        if parsed.command.requires_argument() && parsed.argument().is_none() {
            println!("❌ /{} needs an argument: {}", parsed.command.command(), parsed.command.description());
            return Ok(ReplAction::Continue);
        }
        let argument = parsed.argument().unwrap_or_default().to_string();
        let current = self.session.store().current_id().map(str::to_string).unwrap_or_default();

        let command = match parsed.command {
            SlashCommand::Quit => return Ok(ReplAction::Exit),
            SlashCommand::Help => {
                println!("{}", get_help_text());
                println!("{}", crate::automation::help_text());
                return Ok(ReplAction::Continue);
            }
            SlashCommand::List => {
                self.print_conversations();
                return Ok(ReplAction::Continue);
            }
            SlashCommand::New => SessionCommand::NewConversation,
            SlashCommand::Switch | SlashCommand::Delete => {
                let target = if argument.is_empty() {
                    Some(current)
                } else {
                    resolve_conversation(&argument, &self.session.store().sorted_ids())
                };
                let Some(id) = target else {
                    println!("❌ No conversation '{argument}'. See /list.");
                    return Ok(ReplAction::Continue);
                };
                if parsed.command == SlashCommand::Switch {
                    SessionCommand::SwitchConversation(id)
                } else {
                    SessionCommand::DeleteConversation(id)
                }
            }
            SlashCommand::Rename => SessionCommand::RenameConversation {
                id: current,
                title: argument,
            },
            SlashCommand::Pin => SessionCommand::TogglePin(current),
            SlashCommand::Regen => SessionCommand::Regenerate,
            SlashCommand::Model if argument.is_empty() => {
                self.print_models();
                return Ok(ReplAction::Continue);
            }
            SlashCommand::Model => SessionCommand::SelectModel(argument),
            SlashCommand::Persona if argument.is_empty() => {
                self.print_personas();
                return Ok(ReplAction::Continue);
            }
            SlashCommand::Persona => SessionCommand::SelectPersona(argument),
            SlashCommand::System if argument.is_empty() => {
                println!("{}", self.session.settings().system_prompt);
                return Ok(ReplAction::Continue);
            }
            SlashCommand::System => SessionCommand::SetSystemPrompt(argument),
            SlashCommand::Temp => match argument.parse::<f32>() {
                Ok(value) => SessionCommand::SetTemperature(value),
                Err(_) => {
                    println!("❌ Not a number: {argument}");
                    return Ok(ReplAction::Continue);
                }
            },
            SlashCommand::Like | SlashCommand::Dislike => {
                let Some(index) = self.last_reply_index() else {
                    println!("❌ No reply to rate yet.");
                    return Ok(ReplAction::Continue);
                };
                let feedback = if parsed.command == SlashCommand::Like {
                    Feedback::Like
                } else {
                    Feedback::Dislike
                };
                SessionCommand::SetFeedback { index, feedback }
            }
            SlashCommand::Import => {
                let content = match tokio::fs::read_to_string(&argument).await {
                    Ok(content) => content,
                    Err(err) => {
                        println!("❌ Failed to read {argument}: {err}");
                        return Ok(ReplAction::Continue);
                    }
                };
                SessionCommand::Import {
                    file_name: argument,
                    content,
                }
            }
            SlashCommand::Export => return self.export(&argument).await.map(|_| ReplAction::Continue),
        };

        self.apply(command).await?;
        Ok(ReplAction::Continue)
    }

    /// Apply a command and run any exchange it starts.
    async fn apply(&mut self, command: SessionCommand) -> Result<()> {
        let outcome = match self.session.apply(command) {
            Ok(outcome) => outcome,
            Err(err) => {
                println!("❌ {err}");
                return Ok(());
            }
        };

        match outcome {
            SessionOutcome::Ignored => {}
            SessionOutcome::Updated => self.print_status(),
            SessionOutcome::Replied(text) => println!("{text}"),
            SessionOutcome::Exchange(exchange) => self.stream(exchange).await?,
            SessionOutcome::Queued => {
                if let Ok(SessionOutcome::Exchange(exchange)) =
                    self.session.apply(SessionCommand::RunPendingAutomation)
                {
                    self.stream(exchange).await?;
                }
            }
            SessionOutcome::Imported { title, warnings, .. } => {
                for warning in &warnings {
                    println!("⚠️  item {}: {}", warning.item + 1, warning.message);
                }
                println!("📥 Imported '{title}'");
            }
            SessionOutcome::Exported { file_name, .. } => println!("📤 Exported {file_name}"),
            SessionOutcome::Deleted { title } => {
                println!("🗑️  Deleted '{title}'");
                self.print_status();
            }
        }
        Ok(())
    }

    async fn stream(&mut self, exchange: PreparedExchange) -> Result<()> {
        println!("🤖 {}:", exchange.model_name);

        let cancel = self.session.cancel_handle();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let mut stdout = std::io::stdout();
        let outcome = self
            .session
            .run_exchange(exchange, &self.backend, |fragment| {
                let _ = write!(stdout, "{fragment}");
                let _ = stdout.flush();
            })
            .await;
        watcher.abort();

        if outcome.status == ExchangeStatus::Empty {
            print!("{}", outcome.text);
        }
        println!();
        debug!(status = ?outcome.status, "exchange finished");
        Ok(())
    }

    async fn export(&mut self, target: &str) -> Result<()> {
        let (format, path) = match TranscriptFormat::from_str(target) {
            Ok(format) => (format, None),
            Err(_) => match TranscriptFormat::from_path(Path::new(target)) {
                Ok(format) => (format, Some(target.to_string())),
                Err(err) => {
                    println!("❌ {err}");
                    return Ok(());
                }
            },
        };

        let SessionOutcome::Exported { file_name, content } = self.session.apply(SessionCommand::Export(format))? else {
            return Ok(());
        };
        let path = path.unwrap_or(file_name);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {path}"))?;
        println!("📤 Exported to {path}");
        Ok(())
    }

    fn last_reply_index(&self) -> Option<usize> {
        self.session
            .current_messages()
            .iter()
            .rposition(|m| m.role == Role::Assistant)
    }

    fn print_banner(&self) {
        println!("💬 chatai");
        println!("{}", "=".repeat(50));
        println!("Type a message, !help for chat commands or /help for everything else.");
        self.print_status();
    }

    fn print_status(&self) {
        let settings = self.session.settings();
        if let Some(conversation) = self.session.store().current() {
            println!(
                "📋 {} | 🤖 {} | 🎭 {} | 🌡️ {:.1}",
                conversation.title, settings.model_name, settings.persona_name, settings.temperature
            );
            if let Some(last) = conversation.last_message() {
                println!("{}: {}", last.role.label(), last.content);
            }
        }
    }

    fn print_conversations(&self) {
        let store = self.session.store();
        let current = store.current_id();
        for (position, conversation) in store.conversations().iter().enumerate() {
            let marker = if Some(conversation.id.as_str()) == current { "▶" } else { " " };
            let pin = if conversation.is_pinned { "📌" } else { "  " };
            println!(
                "{marker} {:>2}. {pin} {} ({} messages)",
                position + 1,
                conversation.title,
                conversation.messages.len()
            );
        }
    }

    fn print_models(&self) {
        let selected = &self.session.settings().model_name;
        for model in &self.session.config().models {
            let marker = if &model.name == selected { "▶" } else { " " };
            let free = if model.is_free { " (free)" } else { "" };
            println!("{marker} {} - {}{free}", model.name, model.id);
        }
    }

    fn print_personas(&self) {
        let selected = &self.session.settings().persona_name;
        for persona in &self.session.config().personas {
            let marker = if &persona.name == selected { "▶" } else { " " };
            println!("{marker} {}", persona.name);
        }
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}
