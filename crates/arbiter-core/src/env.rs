//! Environment loading and typed lookups.

use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::config::env_file;

/// Loads `<config>/.env.local` into the process environment, if present.
///
/// Existing variables are never overwritten. Returns `true` if a file was loaded.
pub fn load_env() -> bool {
    load_env_from(&env_file())
}

/// Loads a specific dotenv file, if present.
pub fn load_env_from(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loaded environment file");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load environment file");
            false
        }
    }
}

/// Parses an environment variable, ignoring (and logging) malformed values.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed environment override");
            None
        }
    }
}
