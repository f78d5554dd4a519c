//! Shared types, configuration and persistence for Songdog.
//!
//! Everything in here is free of async runtime state so the engine crate and
//! the binary can both depend on it.

pub mod catalog;
pub mod config;
pub mod matcher;
pub mod platform;
pub mod protocol;
pub mod stages;
pub mod state;
