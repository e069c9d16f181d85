use crate::llm::Fragment;
use crate::prompts::EMPTY_RESPONSE_NOTICE;

/// How an exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStatus {
    /// Model text arrived and the stream ended normally
    Completed,
    /// The stream ended normally without any text
    Empty,
    /// The user stopped generation
    Cancelled,
    /// A transport or server error ended the exchange
    Failed,
}

/// Final state of an exchange, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub text: String,
    pub status: ExchangeStatus,
}

/// State for accumulating one exchange's fragments
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Accumulated text buffer
    accumulated_text: String,
    cancelled: bool,
    failed: bool,
    terminated: bool,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a fragment from the stream
    pub fn push_fragment(&mut self, fragment: &Fragment) {
        if self.terminated {
            return;
        }
        match fragment {
            Fragment::Content(text) => {
                self.accumulated_text.push_str(text);
                return;
            }
            Fragment::Error(_) => self.failed = true,
            Fragment::Cancelled => self.cancelled = true,
        }
        // Keep the notice at the start of its own line
        if !self.accumulated_text.is_empty() && !self.accumulated_text.ends_with('\n') {
            self.accumulated_text.push('\n');
        }
        self.accumulated_text.push_str(fragment.text());
    }

    /// Record a cancellation the stream itself did not report.
    pub fn mark_cancelled(&mut self) {
        if !self.cancelled {
            self.push_fragment(&Fragment::Cancelled);
        }
    }

    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Close the exchange and decide what to persist.
    pub fn finish(&mut self) -> ExchangeOutcome {
        self.terminated = true;
        let status = if self.cancelled {
            ExchangeStatus::Cancelled
        } else if self.failed {
            ExchangeStatus::Failed
        } else if self.accumulated_text.trim().is_empty() {
            ExchangeStatus::Empty
        } else {
            ExchangeStatus::Completed
        };

        let text = match status {
            ExchangeStatus::Empty => EMPTY_RESPONSE_NOTICE.to_string(),
            _ => self.accumulated_text.clone(),
        };
        ExchangeOutcome { text, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{CANCELLED_NOTICE, STOP_MARKER};

    fn content(text: &str) -> Fragment {
        Fragment::Content(text.to_string())
    }

    #[test]
    fn completed_text_is_concatenated() {
        let mut state = StreamState::new();
        for fragment in ["Hel", "lo", " world"] {
            state.push_fragment(&content(fragment));
        }
        let outcome = state.finish();
        assert_eq!(outcome.text, "Hello world");
        assert_eq!(outcome.status, ExchangeStatus::Completed);
        assert!(state.is_terminated());
    }

    #[test]
    fn cancellation_keeps_partial_text_on_separate_line() {
        let mut state = StreamState::new();
        state.push_fragment(&content("partial"));
        state.push_fragment(&Fragment::Cancelled);
        let outcome = state.finish();
        assert_eq!(outcome.status, ExchangeStatus::Cancelled);
        assert_eq!(outcome.text, format!("partial\n{CANCELLED_NOTICE}"));
    }

    #[test]
    fn error_fragment_marks_failure() {
        let mut state = StreamState::new();
        state.push_fragment(&Fragment::Error("🛑 Connection error: refused".to_string()));
        let outcome = state.finish();
        assert_eq!(outcome.status, ExchangeStatus::Failed);
        assert!(outcome.text.starts_with(STOP_MARKER));
    }

    #[test]
    fn model_text_with_stop_marker_still_completes() {
        let mut state = StreamState::new();
        state.push_fragment(&content("🛑 means stop in emoji."));
        let outcome = state.finish();
        assert_eq!(outcome.status, ExchangeStatus::Completed);
        assert_eq!(outcome.text, "🛑 means stop in emoji.");
    }

    #[test]
    fn empty_stream_gets_placeholder() {
        let outcome = StreamState::new().finish();
        assert_eq!(outcome.status, ExchangeStatus::Empty);
        assert_eq!(outcome.text, EMPTY_RESPONSE_NOTICE);
    }

    #[test]
    fn mark_cancelled_is_idempotent() {
        let mut state = StreamState::new();
        state.push_fragment(&Fragment::Cancelled);
        state.mark_cancelled();
        assert_eq!(state.text(), CANCELLED_NOTICE);
        assert!(state.is_cancelled());
    }

    #[test]
    fn fragments_after_finish_are_ignored() {
        let mut state = StreamState::new();
        state.push_fragment(&content("done"));
        state.finish();
        state.push_fragment(&content("late"));
        assert_eq!(state.text(), "done");
    }
}
