//! The process-wide current session.

use std::sync::Arc;

use tokio::sync::watch;

use cb_models::{Session, User};

/// Shared view of the signed-in session.
///
/// Cloning is cheap; every clone observes the same value. The application
/// context's auth-state listener is the only writer.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionHandle {
    /// A handle with no session.
    pub fn new() -> Self {
        Self::with_session(None)
    }

    /// A handle starting from `session`.
    pub fn with_session(session: Option<Session>) -> Self {
        let (tx, _) = watch::channel(session);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn set(&self, session: Option<Session>) {
        self.tx.send_replace(session);
    }

    /// Whether a session is present.
    pub fn is_logged_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.tx.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Watch for changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    /// Wait until the logged-in state equals `logged_in`.
    pub async fn wait_for(&self, logged_in: bool) -> Option<Session> {
        let mut rx = self.tx.subscribe();
        let result = match rx.wait_for(|s| s.is_some() == logged_in).await {
            Ok(session) => session.clone(),
            Err(_) => None,
        };
        result
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}
