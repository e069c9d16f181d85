use crate::config::Persona;

/// Prefix of every error, cancellation, or failure fragment produced locally.
pub const STOP_MARKER: &str = "🛑";

pub const DEFAULT_PERSONA: &str = "General Assistant (Default)";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a versatile and friendly AI assistant. Answer clearly and helpfully.";

pub const SUMMARY_PROMPT: &str = "Summarize this conversation concisely:";

pub const CANCELLED_NOTICE: &str = "🛑 Generation stopped by user.";

pub const EMPTY_RESPONSE_NOTICE: &str = "(The model returned no response.)";

pub const NEW_CHAT_PREFIX: &str = "New Chat";
pub const INITIAL_CHAT_PREFIX: &str = "Initial Chat";
pub const UPLOAD_PREFIX: &str = "Upload:";

/// Greeting seeded into a conversation created without messages.
pub fn greeting(title: &str) -> String {
    format!("Hello! Session '{title}' started.")
}

pub fn builtin_personas() -> Vec<Persona> {
    [
        (DEFAULT_PERSONA, DEFAULT_SYSTEM_PROMPT),
        (
            "Creative Writer",
            "You are an imaginative writer of stories and poems. Favour vivid imagery and original turns of phrase.",
        ),
        (
            "History Expert",
            "You are a historian with broad knowledge. Give context, dates, and sources where you can.",
        ),
        (
            "Expert Translator",
            "You are a professional translator. Preserve meaning and tone, and point out idioms that do not carry over.",
        ),
        (
            "Math Teacher",
            "You are a patient mathematics teacher. Explain step by step and check understanding along the way.",
        ),
    ]
    .into_iter()
    .map(|(name, prompt)| Persona {
        name: name.to_string(),
        system_prompt: prompt.to_string(),
    })
    .collect()
}

/// Whether a message body was produced by a local failure path rather than the model.
pub fn is_stop_message(content: &str) -> bool {
    content.starts_with(STOP_MARKER)
}
