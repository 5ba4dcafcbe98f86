//! Chatbase API - HTTP client for the hosted backend.
//!
//! This crate provides a typed client for the two request/response surfaces
//! of the backend: the auth endpoint (`/auth/v1`) and the table endpoint
//! (`/rest/v1`). Every request carries the anon key and the current bearer
//! token; failures are decoded into the backend's own error object and
//! returned unchanged. There is no retry.

pub mod backend;
pub mod client;
pub mod endpoints;
pub mod query;
pub mod response;

// Re-export key types
pub use backend::{insert_as, select_as, select_single_as, AuthApi, TableApi};
pub use client::ApiClient;
pub use query::{Filter, FilterOp, Order, TableQuery};
pub use response::ErrorSource;
