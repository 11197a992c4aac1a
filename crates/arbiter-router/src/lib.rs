//! Session orchestration router for the Arbiter/Orchestrator hierarchy.
//!
//! This crate provides the state machine that sits between a human, a
//! manager session (the Arbiter) and one ephemeral worker session at a
//! time (an Orchestrator):
//! - `Router` - pure reducer: `(state, input) -> effects`
//! - `RoutingEngine` - async driver executing effects against a `SessionAdapter`
//! - `EventCallbacks` - sink for everything the UI can observe
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use arbiter_adapters::ScriptedAdapter;
//! use arbiter_router::{default_session_store, ChannelCallbacks, RouterConfig, RoutingEngine};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> arbiter_router::Result<()> {
//!     let callbacks = Arc::new(ChannelCallbacks::default());
//!     let mut events = callbacks.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     arbiter_core::init_tracing("info");
//!     let engine = RoutingEngine::new(
//!         Arc::new(ScriptedAdapter::new()),
//!         callbacks,
//!         RouterConfig::from_env(),
//!     )
//!     .with_store(default_session_store());
//!     let (human_tx, human_rx) = mpsc::channel(16);
//!     human_tx.send("hello".to_string()).await.ok();
//!     drop(human_tx);
//!
//!     let record = engine.run(human_rx).await?;
//!     println!("saved ordinal {}", record.orchestrator_ordinal);
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! At most one Orchestrator record is ever spawning, active or draining.
//! A summon that arrives while one is live is queued and started only
//! after the current record is disposed. Events from disposed records are
//! matched by ordinal and dropped.

pub mod callbacks;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
mod probe;
pub mod router;
pub mod state;

pub use callbacks::{ChannelCallbacks, DebugEntry, DebugLevel, EventCallbacks, NoopCallbacks, UiEvent};
pub use config::{default_session_store, RouterConfig, ViolationPolicy};
pub use effect::{Effect, Target};
pub use engine::RoutingEngine;
pub use error::{ProtocolError, Result, RouterError};
pub use router::Router;
pub use state::{RoutingMode, SessionState};
