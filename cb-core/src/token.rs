//! Shared bearer token cell.
//!
//! The auth service writes the current access token here; the HTTP and
//! realtime clients read it when building requests and channel joins.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Cloneable handle to the current access token.
#[derive(Clone, Default)]
pub struct AccessToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl AccessToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token, if a user is signed in.
    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Replace the token. `None` reverts requests to the anon key.
    pub async fn set(&self, token: Option<String>) {
        *self.inner.write().await = token;
    }

    /// The token to send as bearer, falling back to `anon_key`.
    pub async fn bearer_or(&self, anon_key: &str) -> String {
        self.get().await.unwrap_or_else(|| anon_key.to_string())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}
