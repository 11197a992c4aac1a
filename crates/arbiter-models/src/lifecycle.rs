//! Orchestrator lifecycle states and records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{OrchestratorId, SessionId};
use crate::ordinal::Ordinal;

/// Lifecycle of an Orchestrator record.
///
/// `none -> spawning -> active -> draining -> disposed`, plus a direct
/// escape from any non-terminal state to `disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    None,
    Spawning,
    Active,
    Draining,
    Disposed,
}

impl LifecycleState {
    /// Whether a record in this state counts as the single live worker.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Spawning | Self::Active | Self::Draining)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (None, Spawning) | (Spawning, Active) | (Active, Draining) => true,
            (None | Spawning | Active | Draining, Disposed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Spawning => "spawning",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for one Orchestrator session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorRecord {
    pub id: OrchestratorId,
    /// Underlying session, known once the spawn request resolves.
    pub session_id: Option<SessionId>,
    pub ordinal: Ordinal,
    pub context_percent: f64,
    pub current_tool: Option<String>,
    pub tool_call_count: u32,
    pub lifecycle: LifecycleState,
}

impl OrchestratorRecord {
    /// Creates a fresh record in the `none` state.
    pub fn new(ordinal: Ordinal) -> Self {
        Self {
            id: OrchestratorId::random(),
            session_id: None,
            ordinal,
            context_percent: 0.0,
            current_tool: None,
            tool_call_count: 0,
            lifecycle: LifecycleState::None,
        }
    }

    /// Records a tool invocation and returns the running count.
    pub fn record_tool_use(&mut self, name: impl Into<String>) -> u32 {
        self.current_tool = Some(name.into());
        self.tool_call_count += 1;
        self.tool_call_count
    }
}
