//! Interception cache controller.
//!
//! ### Lifecycle
//! - `Installing`: pre-cache the manifest into the shell namespace. Any
//!   failure aborts; no partial shell is kept.
//! - `Installed`: wait until the active instance has no clients, or until a
//!   `SKIP_WAITING` message arrives.
//! - `Activating`: drop every namespace not owned by this version, then
//!   claim clients.
//! - `Activated`: serve requests until superseded (`Redundant`).
//!
//! ### Strategies (GET only, everything else passes through)
//! - core static asset: cache-first from the shell namespace
//! - image: cache-first from the dynamic namespace with a detached refresh,
//!   placeholder SVG when both tiers fail
//! - navigation: network-first, then dynamic, then the cached root document
//! - other same-origin: network-first, then dynamic
//!
//! ### Eviction
//! - After each dynamic write the namespace is trimmed to the ceiling for
//!   that kind of write, dropping earliest-inserted entries first. This is a
//!   FIFO approximation: refreshed entries keep their original position.

pub mod classify;
pub mod controller;
pub mod message;
pub mod placeholder;
pub mod registration;
mod strategy;

pub use classify::{RequestClass, Route, classify};
pub use controller::{Controller, ControllerConfig, ControllerState};
pub use message::ControlMessage;
pub use placeholder::{PLACEHOLDER_SVG, placeholder_image};
pub use registration::{ControllerSummary, Registration, RegistrationStatus};
