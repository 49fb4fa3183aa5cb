//! # Host Bridge Traits
//!
//! Capabilities the decoding core requires from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the decoding core and the host
//! application that feeds it bytes and consumes its frames. Each trait is a
//! capability the core calls into synchronously from the thread driving the
//! session.
//!
//! ## Traits
//!
//! ### Frame delivery
//! - [`VideoSink`](host::VideoSink) - Receives packed planar pictures
//! - [`AudioSink`](host::AudioSink) - Receives channel-interleaved PCM (optional)
//!
//! ### Data delivery
//! - [`RangeRequester`](host::RangeRequester) - Asks the host to fetch bytes
//!   starting at an offset the core needs but does not hold
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Re-entrancy
//!
//! Every callback runs inside a core call (`decode_one_packet`, `seek_to`,
//! `open`). Implementations must return without calling back into the core;
//! they should queue work (post a message, schedule a fetch) instead.
//!
//! ## Closures
//!
//! Plain closures implement the host traits, so simple hosts need no
//! dedicated types:
//!
//! ```
//! use bridge_traits::host::{RangeRequester, VideoSink};
//!
//! let mut frames = 0usize;
//! let mut sink = |data: &[u8], _timestamp: f64| frames += data.len();
//! sink.on_video_frame(&[0u8; 6], 0.0);
//!
//! let mut requester = |offset: u64| println!("fetch from {offset}");
//! requester.request_range(1024);
//! ```

pub mod error;
pub mod host;
pub mod log;

pub use error::BridgeError;

pub use host::{AudioSink, RangeRequester, VideoSink};
pub use log::{LogEntry, LogLevel, LoggerSink, StderrLogger};
