//! # Decode Engine Contract
//!
//! Traits and data types describing the external demultiplexer and codec
//! decoders the session drives.
//!
//! ## Overview
//!
//! The decoding core never parses containers or decodes codecs itself. An
//! engine implementation opens a container over an [`IoAdapter`], exposes the
//! streams it found and hands out one [`StreamDecoder`] per stream:
//!
//! - [`DecodeEngine`] - Entry point, opens a container
//! - [`Demuxer`] - Stream discovery, packet reading and time seeking
//! - [`StreamDecoder`] - Packet in, frames out
//!
//! Engine implementations should log under
//! [`ENGINE_LOG_TARGET`](core_runtime::logging::ENGINE_LOG_TARGET) so hosts can
//! silence them independently of the core.
//!
//! ## I/O
//!
//! All container reads go through the adapter. When the adapter returns
//! [`std::io::ErrorKind::WouldBlock`] the engine must fail the current call
//! with [`EngineError::Io`] and leave its read state so that the same call
//! can be retried once the host has supplied more bytes.

use crate::format::{PixelFormat, Rational, SampleFormat};
use crate::io::IoAdapter;

use bytes::Bytes;
use std::fmt;
use std::io;
use thiserror::Error;

pub use core_runtime::logging::ENGINE_LOG_TARGET;

/// Errors reported by a decode engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Reading or seeking the container failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No {0} stream found")]
    StreamNotFound(MediaKind),

    #[error("No decoder available for stream {0}")]
    DecoderUnavailable(usize),

    /// The container or a packet is malformed.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether the failure only means the adapter ran out of local bytes.
    pub fn is_would_block(&self) -> bool {
        matches!(self, EngineError::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }
}

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoParams {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamParams {
    Video(VideoParams),
    Audio(AudioParams),
}

/// A stream discovered in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    /// Unit of packet and frame timestamps, in seconds.
    pub time_base: Rational,
    pub params: StreamParams,
}

impl StreamInfo {
    pub fn kind(&self) -> MediaKind {
        match self.params {
            StreamParams::Video(_) => MediaKind::Video,
            StreamParams::Audio(_) => MediaKind::Audio,
        }
    }
}

/// A compressed packet read from the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub stream_index: usize,
    pub data: Bytes,
    /// Presentation timestamp in the stream's time base.
    pub pts: i64,
}

/// One plane of a decoded picture. Rows are `stride` bytes apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Bytes,
    pub stride: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
    pub pts: i64,
}

/// Decoded audio. Planar formats carry one plane per channel; packed formats
/// carry a single interleaved plane.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_count: usize,
    pub planes: Vec<Bytes>,
    pub pts: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// Result of reading the next packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Packet(Packet),
    EndOfStream,
}

/// Result of pulling a frame from a decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Receive {
    Frame(DecodedFrame),
    /// The decoder needs another packet before it can emit a frame.
    NeedInput,
    /// The decoder has been fully drained.
    EndOfStream,
}

/// Opens containers.
pub trait DecodeEngine {
    /// Opens a container whose bytes are read through `io`.
    ///
    /// The engine takes ownership of the adapter for the lifetime of the
    /// returned demuxer.
    fn open_input(&self, io: IoAdapter) -> EngineResult<Box<dyn Demuxer>>;
}

/// An opened container.
pub trait Demuxer {
    /// Reads enough of the container to populate [`Demuxer::streams`].
    fn probe_streams(&mut self) -> EngineResult<()>;

    fn streams(&self) -> &[StreamInfo];

    /// Index of the preferred stream of the given kind.
    fn find_best_stream(&self, kind: MediaKind) -> EngineResult<usize> {
        self.streams()
            .iter()
            .find(|stream| stream.kind() == kind)
            .map(|stream| stream.index)
            .ok_or(EngineError::StreamNotFound(kind))
    }

    /// Container duration in microseconds, if known.
    fn duration_us(&self) -> Option<i64>;

    fn open_decoder(&mut self, stream_index: usize) -> EngineResult<Box<dyn StreamDecoder>>;

    /// Excludes a stream from packet reading, or includes it again.
    fn set_discard(&mut self, stream_index: usize, discard: bool);

    fn read_packet(&mut self) -> EngineResult<ReadOutcome>;

    /// Repositions every stream to the last keyframe at or before
    /// `target_us` microseconds.
    fn seek(&mut self, target_us: i64) -> EngineResult<()>;
}

/// A codec decoder bound to one stream.
pub trait StreamDecoder {
    /// Submits a packet and returns how many of its bytes were consumed.
    fn send_packet(&mut self, packet: &Packet) -> EngineResult<usize>;

    fn receive_frame(&mut self) -> EngineResult<Receive>;

    /// Drops buffered packets and frames, typically after a seek.
    fn flush(&mut self);
}
