//! Persistence for the Arbiter.
//!
//! The router keeps almost nothing on disk: a single flat resume record,
//! written at process exit, that lets external tooling reattach to the
//! underlying agent sessions. Writes are atomic (temp file, then rename).

pub mod atomic;
pub mod error;
pub mod session_store;

pub use error::{PersistenceError, Result};
pub use session_store::SessionStore;
