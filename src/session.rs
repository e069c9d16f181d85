//! Per-user session context.
//!
//! A `ChatSession` owns the conversation store and every piece of mutable
//! session state (selected model and persona, the generating guard, the
//! cancellation flag, a queued automation exchange). UI actions arrive as
//! [`SessionCommand`] values and come back as [`SessionOutcome`] values;
//! exchanges themselves run through [`ChatSession::run_exchange`].

use chrono::Local;
use futures::StreamExt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::automation::{self, Dispatch, PendingAutomation};
use crate::config::{Config, ModelInfo};
use crate::conversation::{request_window, ConversationStore, Message, Role, WindowMessage};
use crate::error::{ImportError, SessionError, StoreError};
use crate::events::{PreparedExchange, SessionCommand, SessionOutcome};
use crate::llm::{CancelFlag, CompletionRequest, ModelBackend};
use crate::prompts::{NEW_CHAT_PREFIX, UPLOAD_PREFIX};
use crate::streaming::{ExchangeOutcome, StreamState};
use crate::transcript::{self, TranscriptFormat};

/// Longest file stem carried into an imported conversation's title
const UPLOAD_TITLE_CHARS: usize = 20;

/// Generation settings chosen by the user
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model_name: String,
    pub persona_name: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub history_window: usize,
}

pub struct ChatSession {
    config: Config,
    store: ConversationStore,
    settings: SessionSettings,
    generating: bool,
    cancel: CancelFlag,
    pending_automation: Option<PendingAutomation>,
}

impl ChatSession {
    /// Start a session with one fresh conversation.
    pub fn new(config: Config) -> Self {
        let system_prompt = config
            .persona(&config.default_persona)
            .or_else(|| config.personas.first())
            .map(|p| p.system_prompt.clone())
            .unwrap_or_else(|| crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string());
        let settings = SessionSettings {
            model_name: config.default_model.clone(),
            persona_name: config.default_persona.clone(),
            system_prompt,
            temperature: config.temperature.clamp(0.0, 1.0),
            history_window: config.history_window,
        };

        let mut store = ConversationStore::new();
        store.ensure_current();

        Self {
            config,
            store,
            settings,
            generating: false,
            cancel: CancelFlag::new(),
            pending_automation: None,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn pending_automation(&self) -> Option<&PendingAutomation> {
        self.pending_automation.as_ref()
    }

    /// Handle for cancelling the running exchange from another task.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The selected model, falling back to the first registry entry.
    pub fn current_model(&self) -> Option<&ModelInfo> {
        self.config
            .model(&self.settings.model_name)
            .or_else(|| self.config.models.first())
    }

    /// Id of the current conversation, creating one if needed.
    fn current_id(&mut self) -> String {
        self.store.ensure_current()
    }

    pub fn apply(&mut self, command: SessionCommand) -> Result<SessionOutcome, SessionError> {
        match command {
            SessionCommand::Submit(input) => self.submit(&input),
            SessionCommand::Regenerate => self.regenerate(),
            SessionCommand::RunPendingAutomation => {
                self.ensure_idle()?;
                match self.pending_automation.take() {
                    Some(pending) => {
                        let id = self.current_id();
                        Ok(SessionOutcome::Exchange(self.prepare_automation(id, pending)))
                    }
                    None => Ok(SessionOutcome::Ignored),
                }
            }
            SessionCommand::NewConversation => {
                self.store.create(Vec::new(), NEW_CHAT_PREFIX, false);
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::SwitchConversation(id) => {
                self.store.switch_to_or_fallback(&id)?;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::RenameConversation { id, title } => {
                self.store.rename(&id, &title)?;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::TogglePin(id) => {
                self.store.toggle_pin(&id)?;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::DeleteConversation(id) => {
                let removed = self.store.delete(&id)?;
                Ok(SessionOutcome::Deleted {
                    title: removed.title,
                })
            }
            SessionCommand::SetFeedback { index, feedback } => {
                let id = self.current_id();
                self.store.set_feedback(&id, index, feedback)?;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::Import { file_name, content } => self.import(&file_name, &content),
            SessionCommand::Export(format) => Ok(self.export(format)),
            SessionCommand::SelectModel(name) => {
                if self.config.model(&name).is_none() {
                    return Err(SessionError::UnknownModel(name));
                }
                self.settings.model_name = name;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::SelectPersona(name) => {
                let persona = self
                    .config
                    .persona(&name)
                    .ok_or_else(|| SessionError::UnknownPersona(name.clone()))?;
                self.settings.system_prompt = persona.system_prompt.clone();
                self.settings.persona_name = name;
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::SetSystemPrompt(prompt) => {
                if prompt.trim().is_empty() {
                    return Err(StoreError::Validation("system prompt cannot be empty".to_string()).into());
                }
                self.settings.system_prompt = prompt.trim().to_string();
                Ok(SessionOutcome::Updated)
            }
            SessionCommand::SetTemperature(value) => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(SessionError::InvalidTemperature(value));
                }
                self.settings.temperature = value;
                Ok(SessionOutcome::Updated)
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.generating {
            Err(SessionError::Busy)
        } else {
            Ok(())
        }
    }

    fn submit(&mut self, input: &str) -> Result<SessionOutcome, SessionError> {
        self.ensure_idle()?;
        if input.trim().is_empty() {
            return Ok(SessionOutcome::Ignored);
        }

        let id = self.current_id();
        self.store.append_message(&id, Role::User, input, None)?;

        if !automation::is_automation(input) {
            if self.pending_automation.take().is_some() {
                debug!("dropping stale automation request");
            }
            let window = request_window(
                self.store.messages(&id),
                &self.settings.system_prompt,
                self.settings.history_window,
            );
            return Ok(SessionOutcome::Exchange(self.prepare(id, window, None)));
        }

        let Some(model) = self.current_model().cloned() else {
            return Err(SessionError::UnknownModel(self.settings.model_name.clone()));
        };
        let messages = self.store.messages(&id);
        let history = &messages[..messages.len().saturating_sub(1)];
        match automation::dispatch(input.trim(), &model, history) {
            Dispatch::Reply(text) => {
                self.store
                    .append_message(&id, Role::Assistant, text.clone(), None)?;
                Ok(SessionOutcome::Replied(text))
            }
            Dispatch::Queued(pending) => {
                self.pending_automation = Some(pending);
                Ok(SessionOutcome::Queued)
            }
        }
    }

    /// Ask again for the most recent user message. Earlier replies stay in
    /// the transcript; the new reply is appended after them.
    fn regenerate(&mut self) -> Result<SessionOutcome, SessionError> {
        self.ensure_idle()?;
        let id = self.current_id();
        let messages = self.store.messages(&id);

        let Some(last_user) = messages.iter().rposition(|m| m.role == Role::User) else {
            return Err(SessionError::NothingToRegenerate);
        };
        if messages[last_user + 1..].iter().any(|m| m.role != Role::Assistant) {
            return Err(SessionError::NothingToRegenerate);
        }

        let window = request_window(
            &messages[..=last_user],
            &self.settings.system_prompt,
            self.settings.history_window,
        );
        Ok(SessionOutcome::Exchange(self.prepare(id, window, None)))
    }

    fn prepare_automation(&mut self, id: String, pending: PendingAutomation) -> PreparedExchange {
        self.prepare(id, pending.request_window, Some(pending.model_id))
    }

    /// Build the request and enter the generating state.
    fn prepare(
        &mut self,
        conversation_id: String,
        window: Vec<WindowMessage>,
        model_id: Option<String>,
    ) -> PreparedExchange {
        let selected = self.current_model().cloned();
        let model_id = model_id
            .or_else(|| selected.as_ref().map(|m| m.id.clone()))
            .unwrap_or_default();
        let model_name = self
            .config
            .model_by_id(&model_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| self.settings.model_name.clone());

        self.generating = true;
        self.cancel.reset();
        debug!(conversation = %conversation_id, model = %model_id, "exchange prepared");

        PreparedExchange {
            conversation_id,
            model_name,
            request: CompletionRequest::new(window, model_id, self.settings.temperature),
        }
    }

    /// Stream the exchange, passing every fragment to `on_fragment`, then
    /// persist the result and release the generating guard.
    pub async fn run_exchange<B, F>(
        &mut self,
        exchange: PreparedExchange,
        backend: &B,
        mut on_fragment: F,
    ) -> ExchangeOutcome
    where
        B: ModelBackend + ?Sized,
        F: FnMut(&str),
    {
        let conversation_id = exchange.conversation_id.clone();
        let mut state = StreamState::new();
        let mut fragments = backend.stream(exchange.request, self.cancel.clone());

        while let Some(fragment) = fragments.next().await {
            on_fragment(fragment.text());
            state.push_fragment(&fragment);
        }
        if self.cancel.is_cancelled() {
            state.mark_cancelled();
        }

        self.finish_exchange(&conversation_id, &mut state)
    }

    fn finish_exchange(&mut self, conversation_id: &str, state: &mut StreamState) -> ExchangeOutcome {
        let outcome = state.finish();
        if let Err(err) =
            self.store
                .append_message(conversation_id, Role::Assistant, outcome.text.clone(), Some(Local::now()))
        {
            warn!(error = %err, "conversation vanished before the reply arrived");
        }
        self.generating = false;
        self.cancel.reset();
        info!(status = ?outcome.status, chars = outcome.text.len(), "exchange persisted");
        outcome
    }

    fn import(&mut self, file_name: &str, content: &str) -> Result<SessionOutcome, SessionError> {
        let path = Path::new(file_name);
        let format = TranscriptFormat::from_path(path)?;
        if content.trim().is_empty() {
            return Err(ImportError::Empty.into());
        }

        let decoded = transcript::decode(content, format)?;
        for warning in &decoded.warnings {
            warn!(item = warning.item, kind = ?warning.kind, "{}", warning.message);
        }
        if decoded.messages.is_empty() {
            return Err(ImportError::NoValidItems(format.extension().to_string()).into());
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let prefix = format!(
            "{} {}",
            UPLOAD_PREFIX,
            stem.chars().take(UPLOAD_TITLE_CHARS).collect::<String>()
        );
        let id = self.store.create(decoded.messages, &prefix, true);
        let title = self
            .store
            .get(&id)
            .map(|c| c.title.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        info!(id = %id, file = file_name, "imported transcript");

        Ok(SessionOutcome::Imported {
            id,
            title,
            warnings: decoded.warnings,
        })
    }

    fn export(&mut self, format: TranscriptFormat) -> SessionOutcome {
        let id = self.current_id();
        let content = transcript::encode(self.store.messages(&id), format);
        let file_name = format!(
            "{}_{}.{}",
            id,
            Local::now().format("%H%M"),
            format.extension()
        );
        SessionOutcome::Exported { file_name, content }
    }

    /// Messages of the current conversation.
    pub fn current_messages(&self) -> &[Message] {
        self.store
            .current_id()
            .map(|id| self.store.messages(id))
            .unwrap_or(&[])
    }
}
