use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::prompts;

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for OpenRouter
    pub openrouter_api_key: Option<String>,

    /// Gateway base URL, `/chat/completions` is appended
    pub base_url: String,

    /// Sent as the `HTTP-Referer` header
    pub http_referer: String,

    /// Sent as the `X-Title` header
    pub app_title: String,

    /// Display name of the model selected at startup
    pub default_model: String,

    /// Display name of the persona selected at startup
    pub default_persona: String,

    pub temperature: f32,

    /// Number of trailing messages sent with each request
    pub history_window: usize,

    /// Ceiling on a whole exchange, in seconds
    pub request_timeout_secs: u64,

    pub models: Vec<ModelInfo>,

    pub personas: Vec<Persona>,

    /// Chatai home directory
    #[serde(skip)]
    pub chatai_home: PathBuf,
}

/// One entry of the model registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub supports_vision: bool,
    pub max_tokens: u32,
    #[serde(default)]
    pub is_free: bool,
}

/// A named system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub system_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            openrouter_api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_referer: "http://localhost:8501".to_string(),
            app_title: format!("Chatai ({})", env!("CARGO_PKG_VERSION")),
            default_model: "Meta Llama 3 8B Instruct".to_string(),
            default_persona: prompts::DEFAULT_PERSONA.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            history_window: DEFAULT_HISTORY_WINDOW,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            models: vec![
                ModelInfo {
                    name: "Meta Llama 3 8B Instruct".to_string(),
                    id: "meta-llama/llama-3-8b-instruct".to_string(),
                    supports_vision: false,
                    max_tokens: 8192,
                    is_free: true,
                },
                ModelInfo {
                    name: "DeepSeek Chat V3 0324 (free)".to_string(),
                    id: "deepseek/deepseek-chat-v3-0324:free".to_string(),
                    supports_vision: false,
                    max_tokens: 163_840,
                    is_free: true,
                },
            ],
            personas: prompts::builtin_personas(),
            chatai_home: home.join(".chatai"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.chatai/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let chatai_home = home.join(".chatai");
        let mut config = Self::load_from(&chatai_home.join("config.toml"))?;
        config.chatai_home = chatai_home;
        Ok(config)
    }

    /// Load configuration from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        };
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.chatai_home).context("Failed to create .chatai directory")?;
        let config_path = self.chatai_home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Startup checks. Everything reported here is fatal.
    ///
    /// An unknown `default_model` or `default_persona` is repaired by falling
    /// back to the first registry entry.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::EmptyModelRegistry);
        }
        if self.personas.is_empty() {
            return Err(ConfigError::EmptyPersonaRegistry);
        }
        if self.api_key().is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.model(&self.default_model).is_none() {
            let fallback = self.models[0].name.clone();
            warn!(
                configured = %self.default_model,
                fallback = %fallback,
                "default model not in registry"
            );
            self.default_model = fallback;
        }
        if self.persona(&self.default_persona).is_none() {
            self.default_persona = self.personas[0].name.clone();
        }
        self.temperature = self.temperature.clamp(0.0, 1.0);
        Ok(())
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Get API key from config or environment
    pub fn api_key(&self) -> Option<String> {
        self.openrouter_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
    }

    /// Update API key
    pub fn set_api_key(&mut self, key: String) {
        self.openrouter_api_key = Some(key);
    }

    pub fn model(&self, name: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn model_by_id(&self, id: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|persona| persona.name == name)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
