//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the decoding core:
//! - Logging and tracing infrastructure
//! - Decoder configuration
//!
//! ## Overview
//!
//! This crate contains the ambient utilities the other crates depend on. It
//! establishes the logging conventions (host verbosity levels, the decode
//! engine's log target) and the tunables shared by every session.

pub mod config;
pub mod error;
pub mod logging;

pub use config::DecoderConfig;
pub use error::{Error, Result};
