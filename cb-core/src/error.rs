//! Global error types for Chatbase.
//!
//! All error categories across the workspace are unified into a single
//! `CbError` enum. Failures reported by the backend are never translated:
//! the decoded backend error travels inside the variant as a `RemoteError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience type alias for Results using CbError.
pub type CbResult<T> = Result<T, CbError>;

/// An error object returned by the hosted backend, kept as the backend sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// HTTP status of the failed request.
    pub status: u16,
    /// Backend error code (e.g. "PGRST116", "invalid_credentials").
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Optional details string.
    #[serde(default)]
    pub details: Option<String>,
    /// Optional hint string.
    #[serde(default)]
    pub hint: Option<String>,
}

impl RemoteError {
    /// Build a remote error with only a status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// Attach a backend error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a details string.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (status {}, code {code})", self.message, self.status),
            None => write!(f, "{} (status {})", self.message, self.status),
        }
    }
}

/// Unified error type covering all error categories in Chatbase.
#[derive(Error, Debug)]
pub enum CbError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed before a response was received.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    // -- Remote errors, passed through unchanged --
    /// The auth endpoint rejected the request.
    #[error("auth error: {0}")]
    Auth(RemoteError),

    /// The table endpoint rejected the request.
    #[error("database error: {0}")]
    Database(RemoteError),

    // -- Realtime errors --
    /// Websocket or channel protocol failure.
    #[error("realtime error: {0}")]
    Realtime(String),

    /// The realtime connection is closed.
    #[error("realtime disconnected")]
    RealtimeDisconnected,

    // -- Session errors --
    /// The operation needs a signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CbError {
    /// The backend error object, if this error came from the backend.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            CbError::Auth(e) | CbError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CbError {
    fn from(e: serde_json::Error) -> Self {
        CbError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for CbError {
    fn from(e: toml::de::Error) -> Self {
        CbError::Config(e.to_string())
    }
}
