//! Storage for the resume record written at process exit.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use arbiter_models::PersistedSession;

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::Result;

/// Default file name inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Reads and writes the [`PersistedSession`] record.
///
/// # Example
///
/// ```no_run
/// use arbiter_models::PersistedSession;
/// use arbiter_persistence::SessionStore;
///
/// let store = SessionStore::in_dir("/tmp/arbiter/state");
/// store.save(&PersistedSession::new(None, None, 0)).unwrap();
/// let record = store.load().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store backed by an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `session.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, record: &PersistedSession) -> Result<()> {
        atomic_write_json(&self.path, record)?;
        info!(
            path = %self.path.display(),
            ordinal = record.orchestrator_ordinal,
            "saved session record"
        );
        Ok(())
    }

    /// Loads the record, returning `None` if nothing was saved yet.
    pub fn load(&self) -> Result<Option<PersistedSession>> {
        let record = read_json_optional(&self.path)?;
        debug!(path = %self.path.display(), found = record.is_some(), "loaded session record");
        Ok(record)
    }
}
