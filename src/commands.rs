use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::events::SessionCommand;
use crate::llm::LlmClient;
use crate::session::ChatSession;
use crate::transcript::{self, TranscriptFormat};
use crate::ui::ChatRepl;

/// Overrides given on the command line for `chatai chat`
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub persona: Option<String>,
    pub temperature: Option<f32>,
}

pub async fn start_chat(config: Config, options: ChatOptions) -> Result<()> {
    let client = LlmClient::new(&config)?;
    let mut session = ChatSession::new(config);

    if let Some(model) = options.model {
        session.apply(SessionCommand::SelectModel(model))?;
    }
    if let Some(persona) = options.persona {
        session.apply(SessionCommand::SelectPersona(persona))?;
    }
    if let Some(temperature) = options.temperature {
        session.apply(SessionCommand::SetTemperature(temperature))?;
    }

    ChatRepl::new(session, client).run().await
}

pub fn list_models(config: &Config) -> Result<()> {
    if config.models.is_empty() {
        println!("No models configured.");
        return Ok(());
    }

    println!("🤖 Available models:");
    println!("{}", "=".repeat(50));

    for model in &config.models {
        let marker = if model.name == config.default_model { "▶" } else { " " };
        println!("{marker} {}", model.name);
        println!("   🆔 {}", model.id);
        println!("   📏 Max tokens: {}", model.max_tokens);
        if model.supports_vision {
            println!("   👁️  Vision");
        }
        if model.is_free {
            println!("   💸 Free");
        }
        println!();
    }

    Ok(())
}

/// Convert a transcript between formats, picking both formats from the file
/// extensions.
pub fn convert_transcript(input: &Path, output: &Path) -> Result<()> {
    let from = TranscriptFormat::from_path(input)?;
    let to = TranscriptFormat::from_path(output)?;

    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let decoded = transcript::decode(&content, from)?;
    for warning in &decoded.warnings {
        println!("⚠️  item {}: {}", warning.item + 1, warning.message);
    }
    if decoded.messages.is_empty() {
        bail!("No valid messages found in {}", input.display());
    }

    fs::write(output, transcript::encode(&decoded.messages, to))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(from = %from, to = %to, messages = decoded.messages.len(), "converted transcript");
    println!(
        "✨ Converted {} messages to {}",
        decoded.messages.len(),
        output.display()
    );
    Ok(())
}

/// Store an API key in the config file.
pub fn save_api_key(mut config: Config, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }
    config.set_api_key(key.to_string());
    config.save()?;
    println!("🔑 API key saved to {}", config.chatai_home.join("config.toml").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn converts_json_to_markdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("chat.json");
        let output = dir.path().join("chat.md");
        fs::write(
            &input,
            r#"[{"role":"user","content_text":"hi","timestamp":"2024-01-01T10:00:00"},
                {"role":"assistant","content_text":"hello","timestamp":"2024-01-01T10:00:05"}]"#,
        )
        .expect("write input");

        convert_transcript(&input, &output).expect("convert");

        let markdown = fs::read_to_string(&output).expect("read output");
        let decoded = transcript::decode(&markdown, TranscriptFormat::Markdown).expect("decode");
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[0].role, Role::User);
        assert_eq!(decoded.messages[1].content, "hello");
    }

    #[test]
    fn rejects_unknown_extension_and_empty_transcripts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("chat.txt");
        fs::write(&input, "no stamps here").expect("write input");

        assert!(convert_transcript(&input, &dir.path().join("out.pdf")).is_err());
        assert!(convert_transcript(&input, &dir.path().join("out.json")).is_err());
    }
}
