use log::{ debug, error };

use crate::config::prompt::ERROR_APOLOGY;
use crate::error::ChatError;
use crate::history::ConversationStore;
use crate::models::chat::{ ChatMessage, HistoryItem };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
}

/// One accepted submission. Holds what goes to the provider and the
/// accumulator the placeholder is rebuilt from.
#[derive(Debug)]
pub struct Turn {
    pub prompt: String,
    pub history: Vec<HistoryItem>,
    pub placeholder_id: String,
    accumulated: String,
}

impl Turn {
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty input, or a turn was already in flight. Nothing changed.
    Rejected,
    Completed {
        id: String,
        content: String,
    },
    Failed {
        id: String,
        message: String,
    },
}

/// State owned by one chat session: the conversation and the loading flag.
/// Presentation layers must not submit while `is_loading()` is true; the
/// session rejects such submissions anyway.
#[derive(Debug)]
pub struct ChatSession {
    conversation: ConversationStore,
    phase: Phase,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            conversation: ConversationStore::new(),
            phase: Phase::Idle,
        }
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn can_submit(&self, input: &str) -> bool {
        !input.trim().is_empty() && !self.is_loading()
    }

    /// Idle → Sending. Appends the user message and an empty model
    /// placeholder, returning `None` without touching state when the input is
    /// blank or a turn is already running.
    pub fn begin_turn(&mut self, input: &str) -> Option<Turn> {
        if !self.can_submit(input) {
            debug!(
                "Submission rejected (blank={}, loading={})",
                input.trim().is_empty(),
                self.is_loading()
            );
            return None;
        }

        let history = self.conversation.history_items();
        let placeholder = ChatMessage::model("");
        let placeholder_id = placeholder.id.clone();

        self.conversation.append(ChatMessage::user(input));
        self.conversation.append(placeholder);
        self.phase = Phase::Sending;

        Some(Turn {
            prompt: input.to_string(),
            history,
            placeholder_id,
            accumulated: String::new(),
        })
    }

    /// Sending → Streaming, once the provider accepted the request.
    pub fn stream_opened(&mut self) {
        if self.phase == Phase::Sending {
            self.phase = Phase::Streaming;
        }
    }

    /// Folds one chunk into the placeholder. Empty chunks are skipped and
    /// return false.
    pub fn apply_chunk(&mut self, turn: &mut Turn, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        turn.accumulated.push_str(text);
        self.conversation.replace_content(&turn.placeholder_id, &turn.accumulated);
        true
    }

    pub fn finish_turn(&mut self, turn: Turn) -> TurnOutcome {
        self.phase = Phase::Idle;
        debug!(
            "Turn {} completed with {} chars",
            turn.placeholder_id,
            turn.accumulated.chars().count()
        );
        TurnOutcome::Completed {
            id: turn.placeholder_id,
            content: turn.accumulated,
        }
    }

    /// Any provider failure collapses into the fixed apology. Text received
    /// before the failure is dropped.
    pub fn fail_turn(&mut self, turn: Turn, err: &ChatError) -> TurnOutcome {
        error!("Failed to get response: {}", err);
        self.conversation.replace_content(&turn.placeholder_id, ERROR_APOLOGY);
        self.phase = Phase::Idle;
        TurnOutcome::Failed {
            id: turn.placeholder_id,
            message: ERROR_APOLOGY.to_string(),
        }
    }

    /// Discards every message and reseeds the greeting. An in-flight turn is
    /// not cancelled: its later updates target an id that no longer exists.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }
}
