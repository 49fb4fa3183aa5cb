//! # Progressive Decode Core
//!
//! Decodes a media container while the file is still being delivered.
//!
//! ## Overview
//!
//! The host feeds bytes as they arrive and pulls decoded frames one packet
//! at a time. Whenever the decoder needs bytes the host has not delivered
//! (typically after a seek) it asks the host for the range starting at that
//! offset, and decoding resumes once the bytes arrive.
//!
//! This crate handles:
//! - A backing store modelling a partially delivered file ([`store`])
//! - An I/O adapter presenting the store to a decode engine ([`io`])
//! - The packet decode loop and frame dispatch ([`pipeline`], [`frame`])
//! - Time seeking with optional accurate-seek filtering ([`seek`])
//! - Session lifecycle and host callbacks ([`session`])
//!
//! Container parsing and codec decoding are provided by an external
//! [`DecodeEngine`](engine::DecodeEngine).
//!
//! ## Usage
//!
//! ```ignore
//! use core_decode::{HostCallbacks, Session};
//! use core_runtime::config::DecoderConfig;
//!
//! let mut session = Session::init(file_size, DecoderConfig::default())?;
//! session.send_data(&first_chunk)?;
//!
//! let callbacks = HostCallbacks::new(
//!     |yuv: &[u8], ts: f64| renderer.present(yuv, ts),
//!     |offset: u64| fetcher.restart_at(offset),
//! );
//! let params = session.open(&engine, callbacks)?;
//!
//! loop {
//!     match session.decode_one_packet()? {
//!         DecodeStatus::NeedMoreData => break, // wait for send_data
//!         DecodeStatus::Eof => break,
//!         _ => {}
//!     }
//! }
//! ```

pub mod engine;
pub mod error;
pub mod format;
pub mod frame;
pub mod io;
pub mod pipeline;
mod scratch;
pub mod seek;
pub mod session;
pub mod store;

pub use error::{DecodeError, DecodeStatus, ErrorCode, Result};
pub use format::{PixelFormat, Rational, SampleFormat};
pub use session::{HostCallbacks, OutputParams, Session};
