//! Session adapters for the agent execution engine.
//!
//! The router never talks to an agent engine directly. It goes through the
//! [`SessionAdapter`] trait, which exposes four capabilities: start a
//! session, send a user turn and stream back its events, fork a read-only
//! copy for measurements, and measure a session's context utilisation.
//!
//! [`ScriptedAdapter`] replays pre-recorded turns and is what the router's
//! tests run against.

pub mod error;
pub mod scripted;
pub mod traits;

pub use error::{AdapterError, Result};
pub use scripted::{ScriptedAdapter, SentTurn};
pub use traits::{AdapterInfo, SessionAdapter, SessionConfig, SessionHandle, SessionRole, TurnStream};
