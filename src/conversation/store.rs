//! In-memory collection of conversation threads

use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::message::{Feedback, Message, Role};
use super::title;
use crate::error::StoreError;
use crate::prompts::{self, INITIAL_CHAT_PREFIX};

/// Leading character of automation commands; such messages never become titles.
pub const COMMAND_SIGIL: char = '!';

/// One named conversation thread
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Local>,
    pub title: String,
    pub title_is_fixed: bool,
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Local>>,
}

impl Conversation {
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    fn update_title_from(&mut self, content: &str) {
        if self.title_is_fixed {
            return;
        }
        if let Some(title) = title::derive_title(content, &self.title, self.created_at) {
            self.title = title;
        }
    }

    /// Display order: pinned first by pin time, then newest first.
    fn display_cmp(&self, other: &Self) -> Ordering {
        match (self.is_pinned, other.is_pinned) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => other
                .pinned_at
                .cmp(&self.pinned_at)
                .then_with(|| other.created_at.cmp(&self.created_at))
                .then_with(|| other.id.cmp(&self.id)),
        }
    }
}

/// Conversation collection plus the current-conversation pointer.
///
/// `current`, when set, always names an entry of `conversations`.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    current: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation and make it current.
    ///
    /// An empty `initial_messages` seeds a single assistant greeting.
    pub fn create(
        &mut self,
        initial_messages: Vec<Message>,
        title_prefix: &str,
        title_is_fixed: bool,
    ) -> String {
        let id = self.generate_id();
        let now = Local::now();
        let mut conversation = Conversation {
            id: id.clone(),
            messages: initial_messages,
            created_at: now,
            title: title::default_title(title_prefix, now),
            title_is_fixed,
            is_pinned: false,
            pinned_at: None,
        };

        if conversation.messages.is_empty() {
            let greeting = prompts::greeting(&conversation.title);
            conversation.messages.push(Message::assistant(greeting));
        } else if conversation.messages[0].role == Role::User {
            let content = conversation.messages[0].content.clone();
            conversation.update_title_from(&content);
        }

        info!(id = %id, title = %conversation.title, "created conversation");
        self.conversations.insert(id.clone(), conversation);
        self.current = Some(id.clone());
        id
    }

    fn generate_id(&self) -> String {
        loop {
            let id = format!("chat_{}", Uuid::now_v7().simple());
            if !self.conversations.contains_key(&id) {
                return id;
            }
        }
    }

    /// Startup fallback: guarantee a current conversation exists.
    pub fn ensure_current(&mut self) -> String {
        if let Some(id) = &self.current {
            return id.clone();
        }
        match self.sorted_ids().into_iter().next() {
            Some(id) => {
                self.current = Some(id.clone());
                id
            }
            None => self.create(Vec::new(), INITIAL_CHAT_PREFIX, false),
        }
    }

    pub fn switch_to(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.conversations.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Switch to `id`, or to the first conversation in display order when
    /// `id` is unknown, creating one if the collection is empty.
    pub fn switch_to_or_fallback(&mut self, id: &str) -> Result<String, StoreError> {
        match self.switch_to(id) {
            Ok(()) => Ok(id.to_string()),
            Err(err) => {
                self.current = None;
                self.ensure_current();
                Err(err)
            }
        }
    }

    pub fn rename(&mut self, id: &str, new_title: &str) -> Result<(), StoreError> {
        let trimmed = new_title.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Validation("chat name cannot be empty".to_string()));
        }
        let conversation = self.get_mut(id)?;
        conversation.title = trimmed.to_string();
        conversation.title_is_fixed = true;
        debug!(id, title = trimmed, "renamed conversation");
        Ok(())
    }

    /// Flip the pin state; returns the new state.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool, StoreError> {
        let conversation = self.get_mut(id)?;
        conversation.is_pinned = !conversation.is_pinned;
        conversation.pinned_at = conversation.is_pinned.then(Local::now);
        Ok(conversation.is_pinned)
    }

    /// Remove a conversation. Deleting the current one moves `current` to the
    /// first remaining conversation in display order, or to a fresh one.
    pub fn delete(&mut self, id: &str) -> Result<Conversation, StoreError> {
        let removed = self
            .conversations
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        info!(id, title = %removed.title, "deleted conversation");

        if self.current.as_deref() == Some(id) {
            self.current = None;
            self.ensure_current();
        }
        Ok(removed)
    }

    pub fn append_message(
        &mut self,
        id: &str,
        role: Role,
        content: impl Into<String>,
        timestamp: Option<DateTime<Local>>,
    ) -> Result<(), StoreError> {
        let content = content.into();
        let conversation = self.get_mut(id)?;
        if role == Role::User && !content.starts_with(COMMAND_SIGIL) {
            conversation.update_title_from(&content);
        }
        conversation
            .messages
            .push(Message::new(role, content, timestamp.unwrap_or_else(Local::now)));
        Ok(())
    }

    pub fn set_feedback(
        &mut self,
        id: &str,
        index: usize,
        feedback: Feedback,
    ) -> Result<(), StoreError> {
        let conversation = self.get_mut(id)?;
        let message = conversation
            .messages
            .get_mut(index)
            .ok_or_else(|| StoreError::MessageNotFound {
                id: id.to_string(),
                index,
            })?;
        message.feedback = Some(feedback);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation, StoreError> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current.as_deref().and_then(|id| self.conversations.get(id))
    }

    pub fn messages(&self, id: &str) -> &[Message] {
        self.conversations
            .get(id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Ids in display order.
    pub fn sorted_ids(&self) -> Vec<String> {
        self.conversations().into_iter().map(|c| c.id.clone()).collect()
    }

    /// Conversations in display order.
    pub fn conversations(&self) -> Vec<&Conversation> {
        let mut all: Vec<&Conversation> = self.conversations.values().collect();
        all.sort_by(|a, b| a.display_cmp(b));
        all
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
