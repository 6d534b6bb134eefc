//! Outreach Common - Shared types and utilities
//!
//! This crate provides configuration, the shared error type, and the
//! domain vocabulary used by every Outreach component.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
