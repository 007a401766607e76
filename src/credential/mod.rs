//! Bearer credentials: providers and the in-memory single-flight cache.

pub mod graphql;

pub use graphql::GraphqlCredentialProvider;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::error::CredentialError;

/// An opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Source of bearer tokens for the chat-completion endpoint.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<BearerToken, CredentialError>;
}

/// Provider that always returns the same key.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    token: BearerToken,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn fetch(&self) -> Result<BearerToken, CredentialError> {
        if self.token.as_str().is_empty() {
            return Err(CredentialError::MissingToken);
        }
        Ok(self.token.clone())
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<BearerToken, CredentialError>>>;

enum Slot {
    Absent,
    Fetching { generation: u64, fetch: SharedFetch },
    Present(BearerToken),
}

struct CacheState {
    slot: Slot,
    generation: u64,
}

/// Lazily fetched, process-lifetime credential slot.
///
/// At most one fetch is in flight. Callers that find the slot empty while a
/// fetch is running await that same fetch and all observe its outcome. A
/// failed fetch leaves the slot empty so the next caller starts a new one.
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    state: Mutex<CacheState>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(CacheState {
                slot: Slot::Absent,
                generation: 0,
            }),
        }
    }

    /// Return the cached token, fetching it first if the slot is empty.
    pub async fn token(&self) -> Result<BearerToken, CredentialError> {
        let (generation, fetch) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match &state.slot {
                Slot::Present(token) => return Ok(token.clone()),
                Slot::Fetching { generation, fetch } => {
                    debug!(generation, "joining in-flight credential fetch");
                    (*generation, fetch.clone())
                }
                Slot::Absent => {
                    state.generation += 1;
                    let generation = state.generation;
                    let provider = Arc::clone(&self.provider);
                    let fetch = async move { provider.fetch().await }.boxed().shared();
                    state.slot = Slot::Fetching {
                        generation,
                        fetch: fetch.clone(),
                    };
                    debug!(generation, "fetching credential");
                    (generation, fetch)
                }
            }
        };

        let outcome = fetch.await;

        let mut state = self.lock();
        let current = matches!(
            &state.slot,
            Slot::Fetching { generation: g, .. } if *g == generation
        );
        if current {
            state.slot = match &outcome {
                Ok(token) => Slot::Present(token.clone()),
                Err(err) => {
                    warn!(generation, error = %err, "credential fetch failed");
                    Slot::Absent
                }
            };
        }
        outcome
    }

    /// Whether a token is cached right now.
    pub fn is_present(&self) -> bool {
        matches!(self.lock().slot, Slot::Present(_))
    }

    /// Forget a cached token so the next caller fetches a fresh one.
    ///
    /// A fetch already in flight is left to finish.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        if matches!(state.slot, Slot::Present(_)) {
            state.slot = Slot::Absent;
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = match self.lock().slot {
            Slot::Absent => "absent",
            Slot::Fetching { .. } => "fetching",
            Slot::Present(_) => "present",
        };
        f.debug_struct("CredentialCache").field("slot", &slot).finish()
    }
}
