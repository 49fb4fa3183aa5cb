//! Workspace umbrella crate.
//!
//! This crate exists to expose feature flags that map to the individual
//! workspace crates. Hosts that only need the flat entry points enable
//! `service` (the default); hosts that drive a [`core_decode::Session`]
//! directly enable `decode`.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "decode")]
pub use core_decode as decode;
