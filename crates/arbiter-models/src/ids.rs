//! Identifier newtypes.
//!
//! Session and message ids are minted by the agent engine and only passed
//! through here. Ids created locally (Orchestrator records, sessions of
//! scripted adapters and forks) are a short prefix plus a v4 UUID.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Underlying agent-engine session, as reported by the adapter.
    SessionId
);
string_id!(
    /// Deduplication key of one logical agent turn.
    MessageId
);
string_id!(
    /// Identity of one Orchestrator record, distinct from its ordinal.
    OrchestratorId
);

impl SessionId {
    /// Fresh id for a session created locally.
    pub fn random() -> Self {
        Self(prefixed("sess"))
    }
}

impl OrchestratorId {
    pub fn random() -> Self {
        Self(prefixed("orch"))
    }
}

fn prefixed(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}
