//! Keyed store MCP tools.
//!
//! This module provides tools for reading and maintaining the durable keyed
//! store.

pub mod get;
pub mod purge;
pub mod set;

pub use get::{CacheGetParams, get_impl};
pub use purge::{clear_impl, sweep_impl};
pub use set::{CacheSetParams, set_impl};
