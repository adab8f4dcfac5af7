//! Core of the topic relay.
//!
//! This crate is intentionally framework-agnostic. It maps source forum topics to
//! destination containers and decides where each message goes; the messenger
//! itself lives behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod fallback;
pub mod logging;
pub mod mapping;
pub mod messaging;
pub mod ports;
pub mod resolver;
pub mod router;

pub use errors::{Error, Result};
