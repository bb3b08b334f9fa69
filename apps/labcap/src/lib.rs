//! # Labcap application library
//!
//! Exposes the API and registry modules so integration tests can build
//! the router without starting a real server.

pub mod api;
pub mod registries;
