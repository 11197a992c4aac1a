//! Arbiter Core - shared plumbing for every Arbiter crate.
//!
//! - **config**: filesystem locations under `~/.arbiter`
//! - **env**: `.env.local` loading and typed environment overrides
//! - **logging**: `tracing-subscriber` setup

pub mod config;
pub mod env;
pub mod logging;

pub use config::{env_file, runtime_state_dir, session_file, state_dir};
pub use env::{env_parse, load_env, load_env_from};
pub use logging::{init_tracing, try_init_tracing};
