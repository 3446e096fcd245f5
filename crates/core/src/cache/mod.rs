//! SQLite-backed storage for both cache tiers.
//!
//! This module provides a persistent cache using SQLite with async access
//! via tokio-rusqlite. It holds:
//!
//! - Response namespaces for the interception tier, ordered by insertion
//! - Partitioned keyed entries plus their metadata partition
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod responses;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntryMeta;
pub use responses::CachedResponse;
