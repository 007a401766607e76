//! Message types for chat-completion requests.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation, serialised as `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }

    /// Size of this message against the history budget, in characters.
    pub fn budget_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Total budget size of a message list.
pub fn budget_len(messages: &[ChatMessage]) -> usize {
    messages.iter().map(ChatMessage::budget_len).sum()
}
