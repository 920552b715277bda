//! # wabridge-channels
//!
//! Messaging session clients for wabridge.

pub mod qr;
pub mod sidecar;

pub use sidecar::SidecarClient;
