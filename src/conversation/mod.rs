//! Conversation threads and the messages they hold

pub mod message;
pub mod store;
pub mod title;

pub use message::{request_window, Feedback, Message, Role, WindowMessage};
pub use store::{Conversation, ConversationStore, COMMAND_SIGIL};
