//! Error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    RateLimit,
    Network,
    Server,
    Api,
    Configuration,
    Serialization,
}

/// Suggested recovery action, surfaced next to a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Offer the manual "regenerate" action.
    Retry,
    CheckCredentials,
    CheckConfiguration,
    ReduceInputSize,
    EditMessage,
    ContactSupport,
}
