//! Chatbase Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Chatbase crates:
//! - Application configuration (backend URL, anon key, auth and realtime settings)
//! - Global error type carrying remote backend errors unchanged
//! - Structured logging with tracing
//! - Platform directory lookup
//! - The shared access-token cell read by the HTTP and realtime clients

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;
pub mod token;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{CbError, CbResult, RemoteError};
pub use logging::init_logging;
pub use platform::Platform;
pub use token::AccessToken;
