//! Error types for Vellum.

use thiserror::Error;

/// Primary error type for all Vellum operations.
#[derive(Error, Debug)]
pub enum VellumError {
    /// Chain or service construction failed. Recovered locally by routing;
    /// never surfaced as a fatal error to the session.
    #[error("Routing error: {0}")]
    Routing(String),

    /// The in-flight request was cancelled. Not a failure; ends the turn
    /// cleanly with a "cancelled" message.
    #[error("request cancelled")]
    Cancelled,

    /// A backend call failed after the service exhausted its own retries.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// Whether the failure looks transient (e.g. a connection dropped
        /// mid-stream) and the turn is worth retrying.
        transient: bool,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("missing credential for provider {provider}")]
    MissingCredential { provider: String },
}

/// Coarse classification used for retry and surfacing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Routing,
    Cancellation,
    Transport,
    Io,
    Serialization,
    State,
    Authentication,
}

impl VellumError {
    /// Create a transport error marked transient.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: true,
        }
    }

    /// Create a transport error marked permanent.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            transient: false,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Routing(_) => ErrorCategory::Routing,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Io(_) => ErrorCategory::Io,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidState(_) => ErrorCategory::State,
            Self::MissingCredential { .. } => ErrorCategory::Authentication,
        }
    }

    /// Whether retrying the same turn is worthwhile. Drives the `can_retry`
    /// flag on surfaced system messages.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { transient, .. } => *transient,
            Self::Io(_) => true,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VellumError>;
