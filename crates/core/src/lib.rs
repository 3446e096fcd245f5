//! Core types and shared functionality for depot.
//!
//! This crate provides:
//! - SQLite-backed storage for response namespaces and keyed entries
//! - The durable keyed store with lazy expiry and fail-soft reads
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheDb, CachedResponse};
pub use config::AppConfig;
pub use error::Error;
pub use store::{DurableStore, ReadOutcome, StoreHandle};
