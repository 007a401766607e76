//! Error types for Livia.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::types::ExchangeId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Primary error type for all chat session operations.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Request too large: {length} characters (limit {limit})")]
    RequestTooLarge { length: usize, limit: usize },

    #[error("No credential available: {0}")]
    NoCredential(#[source] CredentialError),

    #[error("Bad response (status {status}): {message}")]
    BadResponse { status: u16, message: String },

    #[error("Transport failure: {message}")]
    TransportFailure {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Decode failure: {message}")]
    DecodeFailure {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(ExchangeId),

    #[error("Exchange {0} cannot be retried")]
    ExchangeNotRetryable(ExchangeId),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ChatError {
    /// Create a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode failure without an underlying source.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyMessage
            | Self::RequestTooLarge { .. }
            | Self::UnknownExchange(_)
            | Self::ExchangeNotRetryable(_) => ErrorCategory::InvalidRequest,
            Self::NoCredential(_) => ErrorCategory::Authentication,
            Self::BadResponse { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::TransportFailure { .. } => ErrorCategory::Network,
            Self::DecodeFailure { .. } => ErrorCategory::Serialization,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether a caller-initiated retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // The credential slot is refetched on the next attempt.
            Self::NoCredential(_) => true,
            _ => matches!(
                self.category(),
                ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server
            ),
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            Self::RequestTooLarge { .. } => RecoverySuggestion::ReduceInputSize,
            Self::NoCredential(_) => RecoverySuggestion::Retry,
            _ => match self.category() {
                ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
                ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Server => RecoverySuggestion::Retry,
                ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
                ErrorCategory::InvalidRequest => RecoverySuggestion::EditMessage,
                _ => RecoverySuggestion::ContactSupport,
            },
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::DecodeFailure {
                message: error.to_string(),
                source: Some(Box::new(error)),
            };
        }
        Self::TransportFailure {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(error: serde_json::Error) -> Self {
        Self::DecodeFailure {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

impl From<CredentialError> for ChatError {
    fn from(error: CredentialError) -> Self {
        Self::NoCredential(error)
    }
}

/// Failures while obtaining a bearer credential.
///
/// `Clone` so a single in-flight fetch can hand the same outcome to every
/// waiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential request failed: {0}")]
    Network(String),
    #[error("Credential endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Credential request rejected: {0}")]
    Rejected(String),
    #[error("Credential response did not contain a key")]
    MissingToken,
    #[error("Invalid credential response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CredentialError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChatError>;
