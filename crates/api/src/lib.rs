//! Copperbay commerce API library.
//!
//! The binary in `main.rs` is a thin shell over this crate: configuration,
//! the document store, domain services and the HTTP surface all live here
//! so tests can drive them directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
