//! Convenience re-exports for common use.

pub use crate::config::ChatConfig;
pub use crate::credential::{BearerToken, CredentialCache, CredentialProvider};
pub use crate::error::{ChatError, CredentialError, Result};
pub use crate::history::ConversationHistory;
pub use crate::provider::{ChatProvider, ChatRequest};
pub use crate::session::{collect_stream, ChatSession, Reply};
pub use crate::types::{
    ChatMessage, ChatStream, Exchange, ExchangeId, ExchangeStatus, Role, SendMode, TextChunk,
};
