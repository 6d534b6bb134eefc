//! Outreach Storage - Campaign and recipient state
//!
//! This crate provides the durable record of campaign and recipient
//! delivery state, backed by PostgreSQL, plus an in-memory store with
//! the same claim semantics for tests and local runs.

pub mod db;
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

pub use db::DatabasePool;
pub use memory::MemoryStore;
pub use models::*;
pub use repository::*;
pub use store::{DbRecipientStore, RecipientStore, SettingsStore};
