//! Core trait for session adapters.
//!
//! The `SessionAdapter` trait is the router's only view of the agent
//! execution engine: start a session, send it a user turn and receive the
//! turn as a stream of events, fork a read-only copy for measurements.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbiter_models::{Ordinal, OrchestratorReply, RoutingIntent, SessionId, TurnEvent};

use crate::error::Result;

/// Stream of events produced by one user turn.
pub type TurnStream = BoxStream<'static, Result<TurnEvent>>;

/// Which side of the hierarchy a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Arbiter,
    Orchestrator,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arbiter => f.write_str("arbiter"),
            Self::Orchestrator => f.write_str("orchestrator"),
        }
    }
}

/// Opaque reference to a live (or forked) session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub role: SessionRole,
    /// Forked handles may be measured but never sent user turns.
    pub read_only: bool,
}

impl SessionHandle {
    pub fn new(session_id: SessionId, role: SessionRole) -> Self {
        Self {
            session_id,
            role,
            read_only: false,
        }
    }

    /// Read-only copy of this handle pointing at a forked session.
    pub fn forked(&self, session_id: SessionId) -> Self {
        Self {
            session_id,
            role: self.role,
            read_only: true,
        }
    }
}

/// Parameters for starting a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub role: SessionRole,
    /// Set for Orchestrator sessions.
    pub ordinal: Option<Ordinal>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    /// Structured-output schema every turn must satisfy.
    pub output_schema: Option<Value>,
    /// Existing session to reattach to instead of starting fresh.
    pub resume: Option<SessionId>,
}

impl SessionConfig {
    /// Config for the Arbiter, constrained to emit a [`RoutingIntent`].
    pub fn arbiter() -> Self {
        Self {
            role: SessionRole::Arbiter,
            ordinal: None,
            system_prompt: None,
            model: None,
            output_schema: Some(RoutingIntent::json_schema()),
            resume: None,
        }
    }

    /// Config for an Orchestrator, constrained to emit an [`OrchestratorReply`].
    pub fn orchestrator() -> Self {
        Self {
            role: SessionRole::Orchestrator,
            ordinal: None,
            system_prompt: None,
            model: None,
            output_schema: Some(OrchestratorReply::json_schema()),
            resume: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: Ordinal) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_resume(mut self, session_id: Option<SessionId>) -> Self {
        self.resume = session_id;
        self
    }
}

/// Information about an adapter implementation.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Interface to the agent execution engine.
///
/// # Example
///
/// ```ignore
/// use arbiter_adapters::{SessionAdapter, SessionConfig};
/// use futures::StreamExt;
///
/// async fn greet(adapter: &dyn SessionAdapter) -> arbiter_adapters::Result<()> {
///     let handle = adapter.start(&SessionConfig::arbiter()).await?;
///     let mut turn = adapter.send(&handle, "hello").await?;
///     while let Some(event) = turn.next().await {
///         println!("{:?}", event?);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// Returns information about this adapter.
    fn info(&self) -> &AdapterInfo;

    /// Starts (or resumes) a session.
    async fn start(&self, config: &SessionConfig) -> Result<SessionHandle>;

    /// Sends a user turn and returns the resulting event stream.
    async fn send(&self, handle: &SessionHandle, text: &str) -> Result<TurnStream>;

    /// Forks a read-only copy of a live session.
    async fn fork(&self, handle: &SessionHandle) -> Result<SessionHandle>;

    /// Measures the true context utilisation of a (forked) session, in tokens.
    async fn measure_context(&self, handle: &SessionHandle) -> Result<u64>;

    /// Releases the underlying session.
    async fn close(&self, _handle: &SessionHandle) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forked_handle_is_read_only() {
        let handle = SessionHandle::new(SessionId::from_string("sess-a"), SessionRole::Arbiter);
        assert!(!handle.read_only);

        let fork = handle.forked(SessionId::from_string("sess-b"));
        assert!(fork.read_only);
        assert_eq!(fork.role, SessionRole::Arbiter);
    }

    #[test]
    fn test_configs_carry_schemas() {
        let arbiter = SessionConfig::arbiter();
        assert_eq!(arbiter.output_schema, Some(RoutingIntent::json_schema()));

        let orchestrator = SessionConfig::orchestrator().with_ordinal(Ordinal::FIRST);
        assert_eq!(orchestrator.role, SessionRole::Orchestrator);
        assert_eq!(orchestrator.ordinal, Some(Ordinal::FIRST));
    }
}
