//! Routes Module
//!
//! HTTP routing for the contact service, built on axum. hyper owns the wire
//! framing; the handlers own validation, body assembly and status mapping.

pub mod handler;

// Re-export commonly used types
pub use handler::{router, AppState};
