use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chatai::commands::{self, ChatOptions};
use chatai::Config;

#[derive(Parser)]
#[command(name = "chatai")]
#[command(version)]
#[command(about = "Streaming terminal chat for OpenRouter models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (the default)
    Chat {
        /// Model display name from the registry
        #[arg(short, long)]
        model: Option<String>,
        /// Persona name
        #[arg(short, long)]
        persona: Option<String>,
        /// Sampling temperature between 0.0 and 1.0
        #[arg(short, long)]
        temperature: Option<f32>,
    },
    /// List configured models
    Models,
    /// Convert a transcript between .json, .txt and .md
    Convert { input: PathBuf, output: PathBuf },
    /// Save an API key to the config file
    SetKey { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Some(Commands::Models) => commands::list_models(&config),
        Some(Commands::Convert { input, output }) => commands::convert_transcript(&input, &output),
        Some(Commands::SetKey { key }) => commands::save_api_key(config, &key),
        Some(Commands::Chat {
            model,
            persona,
            temperature,
        }) => {
            config.validate()?;
            let options = ChatOptions {
                model,
                persona,
                temperature,
            };
            commands::start_chat(config, options).await
        }
        None => {
            config.validate()?;
            commands::start_chat(config, ChatOptions::default()).await
        }
    }
}
