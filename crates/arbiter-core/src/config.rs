//! Shared filesystem locations.
//!
//! All application data lives under `~/.arbiter/`:
//!
//! ```text
//! ~/.arbiter/
//! ├── config/       # .env.local
//! └── state/        # session.json resume record
//! ```
//!
//! # Environment Variables
//!
//! - `ARBITER_STATE_DIR`: Override the base directory
//! - `ARBITER_CONFIG_DIR`: Override the config directory

use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable for a custom base directory.
pub const STATE_DIR_ENV: &str = "ARBITER_STATE_DIR";

/// Environment variable for a custom config directory.
pub const CONFIG_DIR_ENV: &str = "ARBITER_CONFIG_DIR";

const DEFAULT_STATE_DIR: &str = ".arbiter";
const CONFIG_SUBDIR: &str = "config";
const STATE_SUBDIR: &str = "state";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Base directory.
///
/// 1. `ARBITER_STATE_DIR` if set
/// 2. `~/.arbiter` if a home directory is available
/// 3. `.arbiter` in the current directory
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Config directory (`ARBITER_CONFIG_DIR` or `<state>/config`).
fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Directory holding runtime state such as the resume record.
pub fn runtime_state_dir() -> PathBuf {
    state_dir().join(STATE_SUBDIR)
}

/// Resume record written at exit.
pub fn session_file() -> PathBuf {
    runtime_state_dir().join("session.json")
}

/// Secrets and overrides loaded into the environment at startup.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}
