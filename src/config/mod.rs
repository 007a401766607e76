//! Configuration system (layered: defaults > config file > env).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::credential::{CredentialProvider, GraphqlCredentialProvider, StaticCredentialProvider};
use crate::error::ChatError;
use crate::history::DEFAULT_BUDGET_CHARS;
use crate::provider::http::build_client;
use crate::provider::openai::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Longest user message accepted, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 40_000;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Livia, a friendly and knowledgeable astronomy \
assistant. Answer questions about space, planets, stars and natural events clearly and concisely.";

/// Settings for a chat session.
///
/// Resolution order, later layers winning:
/// 1. Built-in defaults
/// 2. TOML config file (`<config dir>/livia/config.toml` or an explicit path)
/// 3. Environment variables (`LIVIA_*`, `.env` loaded if present)
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub history_budget_chars: usize,
    pub max_input_chars: usize,
    pub request_timeout_secs: u64,
    /// GraphQL endpoint that hands out the chat API key.
    pub credential_url: Option<String>,
    /// Shared secret embedded in the credential query.
    pub credential_secret: Option<String>,
    /// Fixed API key; when set, no credential endpoint is queried.
    pub api_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_budget_chars: DEFAULT_BUDGET_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            request_timeout_secs: 120,
            credential_url: None,
            credential_secret: None,
            api_key: None,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("history_budget_chars", &self.history_budget_chars)
            .field("max_input_chars", &self.max_input_chars)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("credential_url", &self.credential_url)
            .field("credential_secret", &self.credential_secret.as_ref().map(|_| ".."))
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

impl ChatConfig {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "livia")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ChatError> {
        toml::from_str(raw).map_err(|e| ChatError::Configuration(format!("invalid config: {e}")))
    }

    /// Read a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ChatError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load all layers. An explicit `path` must exist; the default path may not.
    pub fn load(path: Option<&Path>) -> Result<Self, ChatError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overlay `LIVIA_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LIVIA_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("LIVIA_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("LIVIA_SYSTEM_PROMPT") {
            self.system_prompt = v;
        }
        if let Some(v) = lookup("LIVIA_TEMPERATURE") {
            self.temperature = parse_env("LIVIA_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("LIVIA_HISTORY_BUDGET_CHARS") {
            self.history_budget_chars = parse_env("LIVIA_HISTORY_BUDGET_CHARS", &v)?;
        }
        if let Some(v) = lookup("LIVIA_MAX_INPUT_CHARS") {
            self.max_input_chars = parse_env("LIVIA_MAX_INPUT_CHARS", &v)?;
        }
        if let Some(v) = lookup("LIVIA_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("LIVIA_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("LIVIA_CREDENTIAL_URL") {
            self.credential_url = Some(v);
        }
        if let Some(v) = lookup("LIVIA_CREDENTIAL_SECRET") {
            self.credential_secret = Some(v);
        }
        if let Some(v) = lookup("LIVIA_API_KEY") {
            self.api_key = Some(v);
        }
        Ok(())
    }

    /// Pick the credential source this config describes.
    ///
    /// A fixed `api_key` wins over the GraphQL endpoint. The GraphQL fetch is
    /// bounded by `request_timeout_secs` as a whole.
    pub fn credential_provider(&self) -> Result<Arc<dyn CredentialProvider>, ChatError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(Arc::new(StaticCredentialProvider::new(key)));
        }
        match (&self.credential_url, &self.credential_secret) {
            (Some(url), Some(secret)) => {
                let client = build_client(Duration::from_secs(self.request_timeout_secs))?;
                Ok(Arc::new(
                    GraphqlCredentialProvider::new(url.clone(), secret.clone()).with_client(client),
                ))
            }
            _ => Err(ChatError::Configuration(
                "set LIVIA_API_KEY, or LIVIA_CREDENTIAL_URL and LIVIA_CREDENTIAL_SECRET".into(),
            )),
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ChatError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ChatError::Configuration(format!("{name}: {e}")))
}
