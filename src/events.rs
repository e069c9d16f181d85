use crate::conversation::Feedback;
use crate::llm::CompletionRequest;
use crate::transcript::{ImportWarning, TranscriptFormat};

/// User actions consumed by a chat session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Plain message or `!` automation command for the current conversation
    Submit(String),

    /// Ask the model again for the last user message
    Regenerate,

    /// Run a queued automation exchange, if any
    RunPendingAutomation,

    NewConversation,

    SwitchConversation(String),

    RenameConversation { id: String, title: String },

    TogglePin(String),

    DeleteConversation(String),

    /// React to a message of the current conversation
    SetFeedback { index: usize, feedback: Feedback },

    /// Import a transcript into a new conversation; the format follows the
    /// file name's extension
    Import { file_name: String, content: String },

    /// Export the current conversation
    Export(TranscriptFormat),

    SelectModel(String),

    SelectPersona(String),

    /// Replace the system prompt without changing the persona name
    SetSystemPrompt(String),

    SetTemperature(f32),
}

/// Everything needed to run one exchange, produced when the session
/// accepts a submission. The session stays in its generating state until
/// the exchange is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedExchange {
    pub conversation_id: String,
    pub model_name: String,
    pub request: CompletionRequest,
}

/// Result of applying a [`SessionCommand`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Nothing to do, e.g. blank input
    Ignored,

    /// State changed; nothing else to show
    Updated,

    /// A local answer was appended to the conversation
    Replied(String),

    /// A model exchange must be run next
    Exchange(PreparedExchange),

    /// An automation command queued an exchange; apply
    /// [`SessionCommand::RunPendingAutomation`] to start it
    Queued,

    Imported {
        id: String,
        title: String,
        warnings: Vec<ImportWarning>,
    },

    Exported { file_name: String, content: String },

    Deleted { title: String },
}
