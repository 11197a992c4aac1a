//! Error taxonomy for the router.
//!
//! - [`RouterError::Transport`]: a session stream failed; retried once, then fatal.
//! - [`ProtocolError`]: malformed or mis-targeted structured output; dropped and logged.
//! - [`RouterError::LifecycleViolation`]: an internal invariant would break.
//! - Context tracking warnings live in `arbiter_context::ContextWarning` and are never errors.

use thiserror::Error;

use arbiter_adapters::AdapterError;
use arbiter_models::{IntentError, LifecycleState, Speaker};
use arbiter_persistence::PersistenceError;

use crate::effect::Target;

/// Structured output that cannot be routed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("malformed structured output from {}: {error}", .speaker.label())]
    MalformedIntent { speaker: Speaker, error: IntentError },

    #[error("{intent} requires an active orchestrator (current state: {state})")]
    NoActiveOrchestrator {
        intent: &'static str,
        state: LifecycleState,
    },

    #[error("release requested with no live orchestrator")]
    NothingToRelease,

    #[error("{} produced text without a routing decision", .speaker.label())]
    UnroutedText { speaker: Speaker },
}

/// Errors returned by router and engine operations.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Session stream failed after exhausting its retry.
    #[error("transport failure talking to {target}: {source}")]
    Transport {
        target: Target,
        #[source]
        source: AdapterError,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Two live records, or an illegal lifecycle step.
    #[error("lifecycle violation: {0}")]
    LifecycleViolation(String),

    /// Routing is frozen after a fatal transport failure.
    #[error("routing halted: {0}")]
    Halted(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
