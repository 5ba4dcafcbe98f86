//! Session persistence.
//!
//! Keeps the last session as JSON on disk so a restart can restore it.

use std::path::{Path, PathBuf};

use tracing::debug;

use cb_core::error::CbResult;
use cb_models::Session;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file is not an error.
    pub fn load(&self) -> CbResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let session: Session = serde_json::from_str(&contents)?;
        debug!("loaded session from {}", self.path.display());
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> CbResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents)?;
        debug!("saved session to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> CbResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
