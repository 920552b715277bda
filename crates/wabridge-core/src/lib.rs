//! # wabridge-core
//!
//! Core types, traits, configuration, and error handling for the bridge.

pub mod config;
pub mod error;
pub mod sanitize;
pub mod session;
pub mod traits;
