//! Chat-completion provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

pub use openai::OpenAiChatProvider;

use async_trait::async_trait;
use bon::Builder;

use crate::credential::BearerToken;
use crate::error::ChatError;
use crate::types::{ChatMessage, TextStream};

/// A request sent to a chat provider.
#[derive(Debug, Clone, Builder)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the provider's configured temperature.
    pub temperature: Option<f64>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }
}

/// Core trait implemented by chat-completion backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// The model ID this provider sends requests for.
    fn model_id(&self) -> &str;

    /// Request a complete reply in one response.
    async fn complete(&self, token: &BearerToken, request: &ChatRequest) -> Result<String, ChatError>;

    /// Request a reply as a stream of text fragments.
    ///
    /// Status errors are returned before any fragment is produced; transport
    /// errors after that are yielded once as the last stream item.
    async fn stream(&self, token: &BearerToken, request: &ChatRequest) -> Result<TextStream, ChatError>;
}
