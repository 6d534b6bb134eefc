//! Outreach API - HTTP surface for the send pipeline
//!
//! This crate exposes batch sends, full campaign drives, reset and stop
//! over a small JSON API guarded by a gateway-supplied user header.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
