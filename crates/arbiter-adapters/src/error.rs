//! Error types for session adapters.

use arbiter_models::SessionId;
use thiserror::Error;

/// Failures reported by the agent execution engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The session could not be reached.
    #[error("session unreachable: {0}")]
    Unreachable(String),

    /// A new session could not be started.
    #[error("failed to start session: {0}")]
    StartFailed(String),

    /// The turn stream broke mid-turn.
    #[error("turn stream failed: {0}")]
    Stream(String),

    /// Attempt to send a user turn to a forked, read-only handle.
    #[error("session {0} is read-only")]
    ReadOnly(SessionId),

    /// Handle does not refer to a known session.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The adapter cannot perform this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
