//! Side effects requested by the router.
//!
//! [`Router`](crate::Router) never performs I/O. Each input returns the
//! effects to carry out, in order; [`RoutingEngine`](crate::RoutingEngine)
//! executes them against the adapter and the UI callbacks.

use std::fmt;

use arbiter_models::Ordinal;

use crate::callbacks::UiEvent;

/// Session a user turn is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Arbiter,
    Orchestrator(Ordinal),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Arbiter => f.write_str("the Arbiter"),
            Target::Orchestrator(ordinal) => write!(f, "Orchestrator {}", ordinal),
        }
    }
}

/// One unit of work for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fire a UI callback.
    Emit(UiEvent),
    /// Send `text` as a user turn. `attempt` starts at 1.
    Forward {
        target: Target,
        text: String,
        attempt: u32,
    },
    /// Request a new Orchestrator session from the adapter.
    StartOrchestrator { ordinal: Ordinal, attempt: u32 },
    /// Release the underlying session of a disposed record.
    CloseOrchestrator { ordinal: Ordinal },
}

impl Effect {
    pub fn forward(target: Target, text: impl Into<String>) -> Self {
        Effect::Forward {
            target,
            text: text.into(),
            attempt: 1,
        }
    }
}
