//! Service trait and lifecycle management.
//!
//! Services expose a standard lifecycle (init, shutdown) that the
//! application context drives in dependency order.

use std::sync::Mutex;

use async_trait::async_trait;
use cb_core::error::CbResult;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service has been created but not initialized.
    Created,
    /// Service is initializing.
    Initializing,
    /// Service is running and ready.
    Running,
    /// Service has been stopped.
    Stopped,
    /// Service failed to initialize.
    Failed,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Trait implemented by every long-lived Chatbase service.
#[async_trait]
pub trait Service: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Current state of this service.
    fn state(&self) -> ServiceState;

    /// Initialize the service. Called once during application startup.
    async fn init(&self) -> CbResult<()>;

    /// Release resources. Called during application teardown.
    async fn shutdown(&self) -> CbResult<()>;

    /// Health check. Returns true if the service is operational.
    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

/// Shared lifecycle cell for services that are used behind `Arc`.
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<ServiceState>);

impl StateCell {
    pub fn new() -> Self {
        Self(Mutex::new(ServiceState::Created))
    }

    pub fn get(&self) -> ServiceState {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, state: ServiceState) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}
