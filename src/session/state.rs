//! Mutable state shared between a session and its in-flight streams.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ChatError;
use crate::history::{ConversationHistory, WindowMark};
use crate::types::{ChatMessage, Exchange, ExchangeId, ExchangeStatus};

#[derive(Clone, Default)]
pub(crate) struct SessionState {
    history: Arc<Mutex<ConversationHistory>>,
    transcript: Arc<Mutex<Vec<Exchange>>>,
}

impl SessionState {
    pub(crate) fn history(&self) -> MutexGuard<'_, ConversationHistory> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn transcript(&self) -> MutexGuard<'_, Vec<Exchange>> {
        self.transcript.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn push_exchange(&self, exchange: Exchange) {
        self.transcript().push(exchange);
    }

    pub(crate) fn set_status(&self, id: ExchangeId, status: ExchangeStatus) {
        if let Some(exchange) = self.transcript().iter_mut().find(|e| e.id == id) {
            exchange.status = status;
        }
    }

    /// Remove a failed or cancelled exchange so it can be sent again.
    ///
    /// Completed exchanges are already in history and pending ones are still
    /// running, so neither is handed out.
    pub(crate) fn take_retryable(&self, id: ExchangeId) -> Result<Exchange, ChatError> {
        let mut transcript = self.transcript();
        let index = transcript
            .iter()
            .position(|e| e.id == id)
            .ok_or(ChatError::UnknownExchange(id))?;
        if matches!(
            transcript[index].status,
            ExchangeStatus::Pending | ExchangeStatus::Complete { .. }
        ) {
            return Err(ChatError::ExchangeNotRetryable(id));
        }
        Ok(transcript.remove(index))
    }

    /// Commit a finished exchange to history and mark it complete.
    pub(crate) fn complete(&self, id: ExchangeId, mark: WindowMark, user: ChatMessage, reply: String) {
        self.history()
            .commit(mark, user, ChatMessage::assistant(reply.clone()));
        self.set_status(id, ExchangeStatus::Complete { text: reply });
    }

    pub(crate) fn fail(&self, id: ExchangeId, error: &ChatError) {
        self.set_status(
            id,
            ExchangeStatus::Failed {
                message: error.to_string(),
            },
        );
    }
}

/// Marks a streamed exchange cancelled if its stream is dropped unfinished.
pub(crate) struct ExchangeGuard {
    state: SessionState,
    id: ExchangeId,
    settled: bool,
}

impl ExchangeGuard {
    pub(crate) fn new(state: SessionState, id: ExchangeId) -> Self {
        Self {
            state,
            id,
            settled: false,
        }
    }

    pub(crate) fn complete(&mut self, mark: WindowMark, user: ChatMessage, reply: String) {
        self.settled = true;
        self.state.complete(self.id, mark, user, reply);
    }

    pub(crate) fn fail(&mut self, error: &ChatError) {
        self.settled = true;
        self.state.fail(self.id, error);
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(exchange = %self.id, "stream dropped before completion");
            self.state.set_status(self.id, ExchangeStatus::Cancelled);
        }
    }
}
