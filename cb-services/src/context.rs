//! Application context.
//!
//! Builds the backend clients and services from an [`AppConfig`] and runs
//! the single auth-state listener that feeds the process-wide
//! [`SessionHandle`]. Readiness means the first auth-state event has been
//! applied, so route guards see the restored session.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cb_api::{ApiClient, AuthApi, TableApi};
use cb_core::config::{AppConfig, ConfigHandle};
use cb_core::error::{CbError, CbResult};
use cb_core::token::AccessToken;
use cb_realtime::RealtimeClient;

use crate::auth::{AuthService, AuthStateChange};
use crate::chat::ChatService;
use crate::event_bus::{AppEvent, EventBus};
use crate::router::{Navigation, Router};
use crate::service::Service;
use crate::session::SessionHandle;
use crate::session_store::SessionStore;

/// Backend clients the services run on.
pub struct Backends {
    pub auth: Arc<dyn AuthApi>,
    pub tables: Arc<dyn TableApi>,
    pub realtime: RealtimeClient,
    pub token: AccessToken,
    pub store: Option<SessionStore>,
}

impl Backends {
    /// HTTP and websocket clients for the configured project.
    pub fn from_config(config: &AppConfig) -> CbResult<Self> {
        config.require_backend()?;

        let token = AccessToken::new();
        let api = Arc::new(ApiClient::new(&config.backend, token.clone())?);
        let realtime = RealtimeClient::new(&config.backend, &config.realtime, token.clone())?;
        let store = if config.auth.persist_session {
            Some(SessionStore::new(config.effective_session_path()?))
        } else {
            None
        };

        Ok(Self {
            auth: api.clone(),
            tables: api,
            realtime,
            token,
            store,
        })
    }
}

pub struct AppContext {
    config: ConfigHandle,
    event_bus: EventBus,
    session: SessionHandle,
    auth: Arc<AuthService>,
    chat: Arc<ChatService>,
    router: Router,
    realtime: RealtimeClient,
    listener: Mutex<Option<JoinHandle<()>>>,
    ready_tx: watch::Sender<bool>,
}

impl AppContext {
    /// Context for the backend named in `config`.
    pub fn from_config(config: AppConfig) -> CbResult<Self> {
        let backends = Backends::from_config(&config)?;
        Ok(Self::with_backends(config, backends))
    }

    /// Context over the given backends.
    pub fn with_backends(config: AppConfig, backends: Backends) -> Self {
        let event_bus = EventBus::default();
        let auth = AuthService::new(
            backends.auth,
            backends.token,
            &config.auth,
            backends.store,
        );
        let chat = ChatService::new(backends.tables, backends.realtime.clone(), event_bus.clone());
        let (ready_tx, _) = watch::channel(false);

        Self {
            config: ConfigHandle::new(config),
            event_bus,
            session: SessionHandle::new(),
            auth: Arc::new(auth),
            chat: Arc::new(chat),
            router: Router::new(),
            realtime: backends.realtime,
            listener: Mutex::new(None),
            ready_tx,
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    /// Whether the first auth-state event has been applied.
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Run the route guards for `path` against the current session.
    pub fn navigate(&self, path: &str) -> Navigation {
        self.router.navigate(path, &self.session)
    }

    /// Start the auth listener and the services, then wait until the
    /// restored session (or its absence) is visible on the session handle.
    pub async fn start(&self) -> CbResult<()> {
        {
            let mut listener = self.listener.lock().await;
            if listener.is_some() {
                debug!("context already started");
                return Ok(());
            }
            let rx = self.auth.on_auth_state_change();
            *listener = Some(tokio::spawn(run_listener(
                rx,
                self.session.clone(),
                self.event_bus.clone(),
                self.realtime.clone(),
                self.ready_tx.clone(),
            )));
        }

        self.auth.init().await?;
        self.chat.init().await?;

        let mut ready = self.ready_tx.subscribe();
        ready
            .wait_for(|r| *r)
            .await
            .map_err(|_| CbError::Internal("auth listener stopped before ready".into()))?;

        info!("application context started");
        Ok(())
    }

    /// Stop the services and the auth listener.
    pub async fn shutdown(&self) -> CbResult<()> {
        let chat_result = self.chat.shutdown().await;
        let auth_result = self.auth.shutdown().await;

        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }
        self.ready_tx.send_replace(false);
        info!("application context stopped");

        chat_result.and(auth_result)
    }
}

/// Apply every auth-state change to the session handle.
async fn run_listener(
    mut rx: broadcast::Receiver<AuthStateChange>,
    session: SessionHandle,
    event_bus: EventBus,
    realtime: RealtimeClient,
    ready: watch::Sender<bool>,
) {
    loop {
        match rx.recv().await {
            Ok(change) => {
                let user_id = change.session.as_ref().map(|s| s.user.id);
                debug!("applying auth change {}", change.event);
                session.set(change.session);

                if realtime.channel_count().await > 0 {
                    if let Err(e) = realtime.push_access_token().await {
                        warn!("failed to update realtime token: {e}");
                    }
                }

                event_bus.emit(AppEvent::AuthStateChanged {
                    event: change.event,
                    user_id,
                });
                ready.send_replace(true);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("auth listener lagged by {n} event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("auth state stream closed");
                break;
            }
        }
    }
}
