//! Platform directory lookup.

use std::path::PathBuf;
use crate::constants::APP_NAME;
use crate::error::{CbError, CbResult};

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Detect the current platform at compile time.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Get the platform-specific application data directory (config, logs, session).
    ///
    /// - Windows: `%APPDATA%/Chatbase`
    /// - macOS: `~/Library/Application Support/Chatbase`
    /// - Linux: `~/.local/share/Chatbase`
    pub fn data_dir() -> CbResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| CbError::Config("could not determine data directory".into()))?;
        Ok(base.join(APP_NAME))
    }

    /// Get a human-readable platform name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
