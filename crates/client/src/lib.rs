//! Client code for depot.
//!
//! This crate provides the network side of the caching layer: the HTTP fetch
//! client, request/response types, and the interception cache controller
//! that decides how each request is satisfied.

pub mod fetch;
pub mod intercept;

#[cfg(test)]
mod test_support;

pub use fetch::{Destination, FetchClient, FetchConfig, Network, Request, Response, ResponseSource};

pub use intercept::{
    ControlMessage, Controller, ControllerConfig, ControllerState, Registration, RegistrationStatus, RequestClass,
    Route, classify,
};
