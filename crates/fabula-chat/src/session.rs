//! Chat session state.

use fabula::usage::estimate_message_tokens;
use fabula::{Message, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No messages yet.
    Empty,
    /// Has messages, nothing dropped.
    Active,
    /// Oldest messages have been dropped to fit the budget.
    Truncated,
}

/// One conversation with a character (or the narrator, for story mode).
///
/// Only user and assistant turns are stored; the system prompt is
/// reassembled from retrieval on every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session id.
    pub id: Uuid,
    /// Character name, or `None` for story mode.
    pub character: Option<String>,
    /// User and assistant turns, oldest first.
    pub messages: Vec<Message>,
    /// History lifecycle state.
    pub state: SessionState,
}

impl ChatSession {
    /// Create an empty session for `character` (or the narrator).
    #[must_use]
    pub fn new(character: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            character,
            messages: Vec::new(),
            state: SessionState::Empty,
        }
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    fn push(&mut self, message: Message) {
        debug_assert!(message.role != Role::System);
        self.messages.push(message);
        if self.state == SessionState::Empty {
            self.state = SessionState::Active;
        }
    }

    /// Drop oldest turns until the history fits `budget_tokens`.
    ///
    /// The most recent exchange (latest user message and the reply around
    /// it) always survives, even over budget. Returns how many messages
    /// were dropped; any drop moves the session to
    /// [`SessionState::Truncated`].
    pub fn truncate_to_budget(&mut self, budget_tokens: usize) -> usize {
        let mut dropped = 0usize;
        while self.messages.len() > 2 && estimate_message_tokens(&self.messages) > budget_tokens {
            self.messages.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(
                session = %self.id,
                dropped,
                remaining = self.messages.len(),
                "history truncated to fit token budget"
            );
            self.state = SessionState::Truncated;
        }
        dropped
    }
}
