//! Chatbase Services - Application logic over the hosted backend.
//!
//! This crate provides the service trait and the concrete services:
//! - Auth (sign up/in/out, OAuth URL, profile update, session restore and refresh)
//! - Session handle (the process-wide "current session", fed by one auth listener)
//! - Session persistence on disk
//! - Chat access (lookup, creation, members, messages, realtime subscription)
//! - Router (route table and the two navigation guards)
//! - Event bus (typed intra-service communication)
//! - Application context (wiring and startup)

pub mod service;
pub mod event_bus;
pub mod session;
pub mod session_store;
pub mod auth;
pub mod chat;
pub mod router;
pub mod context;

// Re-export key types
pub use service::{Service, ServiceState};
pub use event_bus::{AppEvent, EventBus};
pub use session::SessionHandle;
pub use session_store::SessionStore;
pub use auth::{AuthChangeEvent, AuthService, AuthStateChange};
pub use chat::{ChatService, MessageChange, MessageSubscription};
pub use router::{GuardOutcome, Navigation, RouteName, Router};
pub use context::{AppContext, Backends};
