//! API endpoint modules organized by surface.
//!
//! Each module adds typed methods to `ApiClient` for one backend endpoint.

pub mod auth;
pub mod rest;
