//! Resume record written at process exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Flat record that lets external tooling reattach to the underlying sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub arbiter_session_id: Option<SessionId>,
    pub last_orchestrator_session_id: Option<SessionId>,
    /// Highest ordinal handed out so far (0 when none was summoned).
    pub orchestrator_ordinal: u32,
    pub saved_at: DateTime<Utc>,
}

impl PersistedSession {
    pub fn new(
        arbiter_session_id: Option<SessionId>,
        last_orchestrator_session_id: Option<SessionId>,
        orchestrator_ordinal: u32,
    ) -> Self {
        Self {
            arbiter_session_id,
            last_orchestrator_session_id,
            orchestrator_ordinal,
            saved_at: Utc::now(),
        }
    }
}
