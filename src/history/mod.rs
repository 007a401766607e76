//! Conversation history with a character budget.
//!
//! Every outgoing request is `[system] + history + [user]`. When that exceeds
//! the budget the oldest history entries are left out, one at a time, until it
//! fits or history is exhausted. The system prompt and the new user message are
//! never dropped; if they alone exceed the budget the request is sent anyway.
//!
//! Building a window does not touch history. The eviction it decided on is
//! applied by [`ConversationHistory::commit`], together with the new
//! user/assistant pair, so a failed exchange leaves history exactly as it was.

use std::iter;

use tracing::debug;

use crate::types::{budget_len, ChatMessage};

/// Default history budget: 16k tokens at roughly four characters per token.
pub const DEFAULT_BUDGET_CHARS: usize = 16_000 * 4;

/// Ordered message history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    epoch: u64,
}

/// Messages to send for one exchange, plus what committing it will evict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestWindow {
    pub messages: Vec<ChatMessage>,
    mark: WindowMark,
}

/// Eviction decided when a window was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMark {
    evicted: usize,
    epoch: u64,
}

impl RequestWindow {
    pub fn mark(&self) -> WindowMark {
        self.mark
    }

    /// Number of oldest history entries left out of this request.
    pub fn evicted(&self) -> usize {
        self.mark.evicted
    }

    /// Total budget size of the messages in this window.
    pub fn budget_len(&self) -> usize {
        budget_len(&self.messages)
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Assemble `[system] + trimmed history + [user]` within `budget` characters.
    pub fn window(&self, system: &ChatMessage, user: &ChatMessage, budget: usize) -> RequestWindow {
        let mut total = system.budget_len() + budget_len(&self.messages) + user.budget_len();
        let mut evicted = 0;

        while total > budget && evicted < self.messages.len() {
            total -= self.messages[evicted].budget_len();
            evicted += 1;
        }

        if evicted > 0 {
            debug!(evicted, total, budget, "history trimmed for request");
        }

        let messages = iter::once(system.clone())
            .chain(self.messages[evicted..].iter().cloned())
            .chain(iter::once(user.clone()))
            .collect();

        RequestWindow {
            messages,
            mark: WindowMark {
                evicted,
                epoch: self.epoch,
            },
        }
    }

    /// Apply a window's eviction and append one completed exchange.
    ///
    /// If history was cleared since the window was built there is nothing left
    /// to evict, and only the pair is appended.
    pub fn commit(&mut self, mark: WindowMark, user: ChatMessage, assistant: ChatMessage) {
        if mark.epoch == self.epoch {
            let evicted = mark.evicted.min(self.messages.len());
            self.messages.drain(..evicted);
        }
        self.messages.push(user);
        self.messages.push(assistant);
    }

    /// Drop every entry. Idempotent.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.epoch += 1;
    }
}
