//! Shared test helpers: a scripted chat provider and a counting credential source.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use livia::credential::{BearerToken, CredentialCache, CredentialProvider};
use livia::error::{ChatError, CredentialError};
use livia::provider::{ChatProvider, ChatRequest};
use livia::session::ChatSession;
use livia::types::{TextChunk, TextStream};

/// What the provider does for the next request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply with these fragments (joined for buffered requests).
    Chunks(Vec<String>),
    /// Stream these fragments, then lose the connection.
    ChunksThenDrop(Vec<String>),
    /// Reject the request with a status.
    Status(u16, String),
    /// Fail before any response.
    Transport,
}

impl Script {
    pub fn chunks(parts: &[&str]) -> Self {
        Self::Chunks(parts.iter().map(|p| p.to_string()).collect())
    }

    pub fn reply(text: &str) -> Self {
        Self::Chunks(vec![text.to_string()])
    }
}

/// A provider that plays back queued scripts and records every request.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ChatRequest) -> Script {
        self.requests.lock().unwrap().push(request.clone());
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::reply("ok"))
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _token: &BearerToken, request: &ChatRequest) -> Result<String, ChatError> {
        match self.next(request) {
            Script::Chunks(parts) => Ok(parts.concat()),
            Script::ChunksThenDrop(_) | Script::Transport => Err(ChatError::transport("connection reset")),
            Script::Status(status, message) => Err(ChatError::BadResponse { status, message }),
        }
    }

    async fn stream(&self, _token: &BearerToken, request: &ChatRequest) -> Result<TextStream, ChatError> {
        let (parts, drop_after) = match self.next(request) {
            Script::Chunks(parts) => (parts, false),
            Script::ChunksThenDrop(parts) => (parts, true),
            Script::Status(status, message) => return Err(ChatError::BadResponse { status, message }),
            Script::Transport => return Err(ChatError::transport("connection refused")),
        };

        let stream = async_stream::stream! {
            for part in parts {
                yield Ok(TextChunk::new(part));
            }
            if drop_after {
                yield Err(ChatError::transport("connection reset mid-stream"));
            }
        };
        Ok(Box::pin(stream))
    }
}

/// A credential source that counts fetches and can be told to fail.
pub struct CountingCredentials {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl CountingCredentials {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Duration::from_millis(25),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn fetch(&self) -> Result<BearerToken, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            Err(CredentialError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        } else {
            Ok(BearerToken::new("test-token"))
        }
    }
}

pub struct Harness {
    pub session: ChatSession,
    pub provider: Arc<ScriptedProvider>,
    pub credentials: Arc<CountingCredentials>,
}

pub fn harness() -> Harness {
    let provider = Arc::new(ScriptedProvider::new());
    let credentials = Arc::new(CountingCredentials::new());
    let session = ChatSession::new(
        provider.clone(),
        Arc::new(CredentialCache::new(credentials.clone())),
    )
    .with_system_prompt("You are a test assistant.");
    Harness {
        session,
        provider,
        credentials,
    }
}
