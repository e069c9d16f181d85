use thiserror::Error;

/// Fatal problems detected while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key configured. Set OPENROUTER_API_KEY or add openrouter_api_key to the config file")]
    MissingApiKey,

    #[error("Model registry is empty")]
    EmptyModelRegistry,

    #[error("Persona registry is empty")]
    EmptyPersonaRegistry,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures of conversation store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Message index {index} out of range for conversation {id}")]
    MessageNotFound { id: String, index: usize },

    #[error("Invalid input: {0}")]
    Validation(String),
}

/// Whole-transcript import failures. Per-item problems are warnings, not errors.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid JSON format: top level must be a list")]
    NotAList,

    #[error("Unsupported file type: .{0}")]
    UnsupportedFormat(String),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("No valid items found in .{0} file")]
    NoValidItems(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the chat session when a command cannot be applied.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A response is still being generated")]
    Busy,

    #[error("Nothing to regenerate")]
    NothingToRegenerate,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("Temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f32),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Import(#[from] ImportError),
}
