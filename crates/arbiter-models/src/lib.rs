//! Core data models for the Arbiter session router.
//!
//! This crate provides the types shared by every layer: conversation
//! messages, Orchestrator lifecycle records, structured routing intents,
//! per-turn usage samples, and the persisted resume record.

pub mod ids;
pub mod intent;
pub mod lifecycle;
pub mod message;
pub mod ordinal;
pub mod session;
pub mod turn;

pub use ids::{MessageId, OrchestratorId, SessionId};
pub use intent::{IntentError, OrchestratorReply, RoutingIntent};
pub use lifecycle::{LifecycleState, OrchestratorRecord};
pub use message::{Message, MessageKind, Speaker};
pub use ordinal::Ordinal;
pub use session::PersistedSession;
pub use turn::{ContextSample, ToolUseEvent, TurnEvent};
