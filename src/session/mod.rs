//! A bounded conversation with a chat-completion service.
//!
//! [`ChatSession`] owns the history sent to the model, the cached credential,
//! and the caller-visible transcript. Both send paths share one pipeline:
//! validate the input, resolve the credential, build the history window, call
//! the provider, and commit `(user, assistant)` only once the reply is whole.
//! A failed exchange is recorded in the transcript with its error and never
//! reaches history.

mod state;

use std::sync::Arc;

use futures::StreamExt;
use tracing::debug;

use crate::config::{ChatConfig, DEFAULT_MAX_INPUT_CHARS, DEFAULT_SYSTEM_PROMPT};
use crate::credential::{BearerToken, CredentialCache};
use crate::error::{ChatError, Result};
use crate::history::{RequestWindow, DEFAULT_BUDGET_CHARS};
use crate::provider::{ChatProvider, ChatRequest, OpenAiChatProvider};
use crate::types::{
    ChatMessage, ChatStream, Exchange, ExchangeId, SendMode, StreamTextResult,
};

use state::{ExchangeGuard, SessionState};

/// Outcome of [`ChatSession::retry`], shaped by the retried exchange's mode.
#[derive(Debug)]
pub enum Reply {
    Stream(ChatStream),
    Text(String),
}

/// One conversation with a chat-completion endpoint.
///
/// Sends on one session are expected to be serialised by the caller; reads
/// such as [`history`](Self::history) are safe at any time.
pub struct ChatSession {
    provider: Arc<dyn ChatProvider>,
    credentials: Arc<CredentialCache>,
    system: ChatMessage,
    budget_chars: usize,
    max_input_chars: usize,
    temperature: Option<f64>,
    state: SessionState,
}

struct Prepared {
    token: BearerToken,
    window: RequestWindow,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn ChatProvider>, credentials: Arc<CredentialCache>) -> Self {
        Self {
            provider,
            credentials,
            system: ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
            budget_chars: DEFAULT_BUDGET_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            temperature: None,
            state: SessionState::default(),
        }
    }

    /// Build a session talking to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let provider = OpenAiChatProvider::from_config(config)?;
        let credentials = CredentialCache::new(config.credential_provider()?);
        Ok(Self::new(Arc::new(provider), Arc::new(credentials))
            .with_system_prompt(config.system_prompt.clone())
            .with_history_budget(config.history_budget_chars)
            .with_max_input_chars(config.max_input_chars))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system = ChatMessage::system(prompt);
        self
    }

    pub fn with_history_budget(mut self, chars: usize) -> Self {
        self.budget_chars = chars;
        self
    }

    pub fn with_max_input_chars(mut self, chars: usize) -> Self {
        self.max_input_chars = chars;
        self
    }

    /// Sample every request at `temperature` instead of the provider's default.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system.content
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// Snapshot of the history sent with the next request.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.state.history().messages().to_vec()
    }

    /// Snapshot of every exchange shown to the caller, oldest first.
    pub fn transcript(&self) -> Vec<Exchange> {
        self.state.transcript().clone()
    }

    /// Drop all history. Idempotent; a request already in flight still commits.
    pub fn clear_history(&self) {
        self.state.history().clear();
    }

    pub fn clear_transcript(&self) {
        self.state.transcript().clear();
    }

    /// Send `user_text` and stream the reply as it arrives.
    ///
    /// Input, credential and status failures are returned here and nothing is
    /// streamed. Once the stream is returned, a transport failure arrives as
    /// its last item.
    pub async fn send_streaming(&self, user_text: impl Into<String>) -> Result<ChatStream> {
        let user_text = user_text.into();
        let id = self.begin(&user_text, SendMode::Streaming);

        let prepared = self.prepare(&user_text).await;
        let (prepared, inner) = match prepared {
            Ok(prepared) => {
                let request = self.request(&prepared.window);
                match self.provider.stream(&prepared.token, &request).await {
                    Ok(inner) => (prepared, inner),
                    Err(err) => return Err(self.fail(id, err)),
                }
            }
            Err(err) => return Err(self.fail(id, err)),
        };

        let mark = prepared.window.mark();
        let user = ChatMessage::user(user_text);
        let mut guard = ExchangeGuard::new(self.state.clone(), id);
        let mut inner = inner;

        let stream = async_stream::stream! {
            let mut reply = String::new();
            let mut failed = false;

            while let Some(item) = inner.next().await {
                match item {
                    Ok(chunk) => {
                        reply.push_str(&chunk.text);
                        yield Ok(chunk);
                    }
                    Err(err) => {
                        debug!(exchange = %id, error = %err, "stream failed");
                        guard.fail(&err);
                        failed = true;
                        yield Err(err);
                        break;
                    }
                }
            }

            if !failed {
                debug!(exchange = %id, chars = reply.chars().count(), "stream complete");
                guard.complete(mark, user, reply);
            }
        };

        Ok(ChatStream::new(id, Box::pin(stream)))
    }

    /// Send `user_text` and wait for the whole reply.
    pub async fn send_buffered(&self, user_text: impl Into<String>) -> Result<String> {
        let user_text = user_text.into();
        let id = self.begin(&user_text, SendMode::Buffered);

        let prepared = match self.prepare(&user_text).await {
            Ok(prepared) => prepared,
            Err(err) => return Err(self.fail(id, err)),
        };

        let request = self.request(&prepared.window);
        match self.provider.complete(&prepared.token, &request).await {
            Ok(reply) => {
                self.state.complete(
                    id,
                    prepared.window.mark(),
                    ChatMessage::user(user_text),
                    reply.clone(),
                );
                Ok(reply)
            }
            Err(err) => Err(self.fail(id, err)),
        }
    }

    /// Regenerate an exchange in the mode it was first sent with.
    pub async fn retry(&self, id: ExchangeId) -> Result<Reply> {
        let exchange = self.take_for_retry(id)?;
        match exchange.mode {
            SendMode::Streaming => self.send_streaming(exchange.user_text).await.map(Reply::Stream),
            SendMode::Buffered => self.send_buffered(exchange.user_text).await.map(Reply::Text),
        }
    }

    /// Regenerate an exchange as a stream.
    pub async fn retry_streaming(&self, id: ExchangeId) -> Result<ChatStream> {
        let exchange = self.take_for_retry(id)?;
        self.send_streaming(exchange.user_text).await
    }

    /// Regenerate an exchange as a buffered request.
    pub async fn retry_buffered(&self, id: ExchangeId) -> Result<String> {
        let exchange = self.take_for_retry(id)?;
        self.send_buffered(exchange.user_text).await
    }

    /// The most recent exchange that failed, if any.
    pub fn last_failed(&self) -> Option<ExchangeId> {
        self.state
            .transcript()
            .iter()
            .rev()
            .find(|e| e.is_failed())
            .map(|e| e.id)
    }

    /// Take a failed or cancelled exchange out of the transcript.
    ///
    /// The re-sent request resolves its credential through
    /// [`CredentialCache::token`], which fetches again when the slot is empty.
    fn take_for_retry(&self, id: ExchangeId) -> Result<Exchange> {
        self.state.take_retryable(id)
    }

    fn begin(&self, user_text: &str, mode: SendMode) -> ExchangeId {
        let exchange = Exchange::pending(user_text, mode);
        let id = exchange.id;
        self.state.push_exchange(exchange);
        id
    }

    fn fail(&self, id: ExchangeId, err: ChatError) -> ChatError {
        debug!(exchange = %id, error = %err, "exchange failed");
        self.state.fail(id, &err);
        err
    }

    async fn prepare(&self, user_text: &str) -> Result<Prepared> {
        self.validate(user_text)?;

        let token = self.credentials.token().await?;

        let user = ChatMessage::user(user_text);
        let window = self
            .state
            .history()
            .window(&self.system, &user, self.budget_chars);

        debug!(
            model = self.provider.model_id(),
            messages = window.messages.len(),
            chars = window.budget_len(),
            evicted = window.evicted(),
            "prepared chat request"
        );

        Ok(Prepared { token, window })
    }

    fn request(&self, window: &RequestWindow) -> ChatRequest {
        ChatRequest::builder()
            .messages(window.messages.clone())
            .maybe_temperature(self.temperature)
            .build()
    }

    fn validate(&self, user_text: &str) -> Result<()> {
        if user_text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let length = user_text.chars().count();
        if length > self.max_input_chars {
            return Err(ChatError::RequestTooLarge {
                length,
                limit: self.max_input_chars,
            });
        }
        Ok(())
    }
}

/// Drain a chat stream into its full text.
pub async fn collect_stream(mut stream: ChatStream) -> Result<StreamTextResult> {
    let mut text = String::new();
    let mut chunks = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        text.push_str(&chunk.text);
        chunks += 1;
    }

    Ok(StreamTextResult { text, chunks })
}
