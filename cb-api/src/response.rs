//! Backend error bodies.
//!
//! The auth and table endpoints report failures in different JSON shapes.
//! Both are normalized into a `RemoteError` without changing the backend's
//! code or message.

use serde::Deserialize;

use cb_core::error::{CbError, RemoteError};

/// Which endpoint produced a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Auth,
    Table,
}

/// Error body of the auth endpoint.
///
/// Newer servers send `{code, error_code, msg}`; token grants send
/// OAuth-style `{error, error_description}`.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Error body of the table endpoint.
#[derive(Debug, Default, Deserialize)]
struct TableErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Decode a failed response body into a `RemoteError`.
pub fn decode_remote_error(status: u16, body: &str, source: ErrorSource) -> RemoteError {
    let fallback = || {
        if body.trim().is_empty() {
            format!("request failed with status {status}")
        } else {
            body.trim().to_string()
        }
    };

    match source {
        ErrorSource::Auth => {
            let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
            RemoteError {
                status,
                code: parsed.error_code.or(parsed.error),
                message: parsed
                    .msg
                    .or(parsed.message)
                    .or(parsed.error_description)
                    .unwrap_or_else(fallback),
                details: None,
                hint: None,
            }
        }
        ErrorSource::Table => {
            let parsed: TableErrorBody = serde_json::from_str(body).unwrap_or_default();
            RemoteError {
                status,
                code: parsed.code,
                message: parsed.message.unwrap_or_else(fallback),
                details: parsed.details,
                hint: parsed.hint,
            }
        }
    }
}

/// Wrap a remote error in the `CbError` variant for its source.
pub fn into_cb_error(remote: RemoteError, source: ErrorSource) -> CbError {
    match source {
        ErrorSource::Auth => CbError::Auth(remote),
        ErrorSource::Table => CbError::Database(remote),
    }
}
