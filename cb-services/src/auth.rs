//! Authentication service.
//!
//! Wraps the auth endpoint: sign-up, password sign-in, OAuth authorization
//! URLs, profile metadata updates, sign-out, and session refresh. Every
//! change of the signed-in session is announced on an auth-state stream;
//! the service never touches the application's session handle itself.
//! Remote errors are returned exactly as the backend reported them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use cb_api::AuthApi;
use cb_core::config::AuthConfig;
use cb_core::constants;
use cb_core::error::{CbError, CbResult};
use cb_core::token::AccessToken;
use cb_models::{ProfileUpdate, Session, SignUpOutcome, User};

use crate::service::{Service, ServiceState, StateCell};
use crate::session_store::SessionStore;

/// Kind of auth-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    /// Emitted once by `initialize`, with the restored session or none.
    InitialSession,
    SignedIn,
    SignedOut,
    UserUpdated,
    TokenRefreshed,
}

impl std::fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitialSession => write!(f, "INITIAL_SESSION"),
            Self::SignedIn => write!(f, "SIGNED_IN"),
            Self::SignedOut => write!(f, "SIGNED_OUT"),
            Self::UserUpdated => write!(f, "USER_UPDATED"),
            Self::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
        }
    }
}

/// One auth-state change: what happened and the session afterwards.
#[derive(Debug, Clone)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

pub struct AuthService {
    api: Arc<dyn AuthApi>,
    token: AccessToken,
    store: Option<SessionStore>,
    site_url: String,
    default_provider: String,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    state: StateCell,
}

impl AuthService {
    /// Create the service. `store` enables session persistence.
    pub fn new(
        api: Arc<dyn AuthApi>,
        token: AccessToken,
        config: &AuthConfig,
        store: Option<SessionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            api,
            token,
            store,
            site_url: cb_core::AppConfig::sanitize_url(&config.site_url),
            default_provider: config.oauth_provider.clone(),
            session: Mutex::new(None),
            events,
            state: StateCell::new(),
        }
    }

    /// Subscribe to auth-state changes.
    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    /// The session this service currently holds.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Redirect target of the sign-up confirmation email.
    pub fn email_redirect_url(&self) -> String {
        format!("{}/?{}", self.site_url, constants::EMAIL_CONFIRMATION_QUERY)
    }

    /// Restore a persisted session, then emit `InitialSession`.
    ///
    /// An expired session is refreshed. A live one is checked against the
    /// auth server and refreshed if the server rejects its access token.
    /// A session that cannot be refreshed is dropped.
    pub async fn initialize(&self) -> CbResult<Option<Session>> {
        let restored = match self.store.as_ref().map(SessionStore::load) {
            Some(Ok(session)) => session,
            Some(Err(e)) => {
                warn!("ignoring unreadable stored session: {e}");
                None
            }
            None => None,
        };

        let session = match restored {
            Some(session) if session.is_expired() => {
                debug!("stored session expired, refreshing");
                self.refresh_restored(&session).await
            }
            Some(mut session) => match self.api.get_user(&session.access_token).await {
                Ok(user) => {
                    session.user = user;
                    Some(session)
                }
                Err(e) => {
                    warn!("stored session rejected ({e}), refreshing");
                    self.refresh_restored(&session).await
                }
            },
            None => None,
        };

        self.replace_session(session.clone()).await;
        info!(
            "auth initialized ({})",
            if session.is_some() { "session restored" } else { "no session" }
        );
        self.emit(AuthChangeEvent::InitialSession, session.clone());
        Ok(session)
    }

    async fn refresh_restored(&self, session: &Session) -> Option<Session> {
        match self.api.refresh_session(&session.refresh_token).await {
            Ok(fresh) => Some(fresh),
            Err(e) => {
                warn!("could not refresh stored session: {e}");
                None
            }
        }
    }

    /// Create an account with `username` as the profile name.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> CbResult<SignUpOutcome> {
        let data = json!({ "full_name": username, "avatar_url": "" });
        let redirect = self.email_redirect_url();
        let outcome = self
            .api
            .sign_up(email, password, &data, Some(&redirect))
            .await?;

        match &outcome {
            SignUpOutcome::Session(session) => {
                self.replace_session(Some(session.clone())).await;
                self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
            }
            SignUpOutcome::ConfirmationRequired(user) => {
                info!("sign-up for {} awaits email confirmation", user.id);
            }
        }
        Ok(outcome)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> CbResult<Session> {
        let session = self.api.sign_in_with_password(email, password).await?;
        self.replace_session(Some(session.clone())).await;
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Authorization URL of an OAuth provider, `github` unless given.
    ///
    /// The code exchange after the provider redirects back is not handled.
    pub fn sign_in_with_oauth(&self, provider: Option<&str>) -> CbResult<String> {
        let provider = provider.unwrap_or(&self.default_provider);
        if provider.trim().is_empty() {
            return Err(CbError::Config("oauth provider is empty".into()));
        }
        Ok(self.api.authorize_url(provider, None))
    }

    /// Patch the signed-in user's profile metadata.
    pub async fn update_user(&self, update: &ProfileUpdate) -> CbResult<User> {
        let Some(mut session) = self.current_session().await else {
            return Err(CbError::NotAuthenticated);
        };

        let data = serde_json::to_value(update)?;
        let user = self.api.update_user(&session.access_token, &data).await?;

        session.user = user.clone();
        self.replace_session(Some(session.clone())).await;
        self.emit(AuthChangeEvent::UserUpdated, Some(session));
        Ok(user)
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh_session(&self) -> CbResult<Session> {
        let Some(current) = self.current_session().await else {
            return Err(CbError::NotAuthenticated);
        };
        let session = self.api.refresh_session(&current.refresh_token).await?;
        self.replace_session(Some(session.clone())).await;
        self.emit(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Revoke the session remotely and clear it locally.
    ///
    /// The local session is cleared and `SignedOut` emitted even when the
    /// remote call fails; the remote error is still returned.
    pub async fn sign_out(&self) -> CbResult<()> {
        let previous = self.session.lock().await.take();
        let remote = match &previous {
            Some(session) => self.api.sign_out(&session.access_token).await,
            None => Ok(()),
        };

        self.replace_session(None).await;
        self.emit(AuthChangeEvent::SignedOut, None);
        remote
    }

    /// Install `session` as current: token cell, memory, and disk.
    async fn replace_session(&self, session: Option<Session>) {
        self.token
            .set(session.as_ref().map(|s| s.access_token.clone()))
            .await;

        if let Some(store) = &self.store {
            let result = match &session {
                Some(s) => store.save(s),
                None => store.clear(),
            };
            if let Err(e) = result {
                warn!("session persistence failed: {e}");
            }
        }

        *self.session.lock().await = session;
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        debug!("auth state change: {event}");
        let _ = self.events.send(AuthStateChange { event, session });
    }
}

#[async_trait]
impl Service for AuthService {
    fn name(&self) -> &str {
        "auth"
    }

    fn state(&self) -> ServiceState {
        self.state.get()
    }

    async fn init(&self) -> CbResult<()> {
        self.state.set(ServiceState::Initializing);
        match self.initialize().await {
            Ok(_) => {
                self.state.set(ServiceState::Running);
                Ok(())
            }
            Err(e) => {
                self.state.set(ServiceState::Failed);
                Err(e)
            }
        }
    }

    async fn shutdown(&self) -> CbResult<()> {
        self.state.set(ServiceState::Stopped);
        Ok(())
    }
}
