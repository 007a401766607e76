//! Caller-visible transcript records.
//!
//! The transcript is what a chat view renders. It is separate from the
//! conversation history sent to the model: failed exchanges stay here with
//! their error attached but are never committed to history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Identifier of one user/assistant exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How an exchange was sent, and therefore how it is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SendMode {
    Streaming,
    Buffered,
}

/// Lifecycle of an exchange as the caller sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    Complete { text: String },
    Failed { message: String },
    Cancelled,
}

/// One user message and its reply in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    pub user_text: String,
    pub mode: SendMode,
    pub status: ExchangeStatus,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub(crate) fn pending(user_text: impl Into<String>, mode: SendMode) -> Self {
        Self {
            id: ExchangeId::new(),
            user_text: user_text.into(),
            mode,
            status: ExchangeStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Whether the exchange ended in failure and can be regenerated.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExchangeStatus::Failed { .. })
    }

    /// The reply text, when the exchange completed.
    pub fn reply(&self) -> Option<&str> {
        match &self.status {
            ExchangeStatus::Complete { text } => Some(text),
            _ => None,
        }
    }
}
