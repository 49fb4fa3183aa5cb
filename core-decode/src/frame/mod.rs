//! # Frame Post-Processing
//!
//! Turns decoded frames into the byte layouts hosts consume and hands them
//! to the host sinks.
//!
//! - Video: packed planar YUV 4:2:0 ([`picture`])
//! - Audio: channel-interleaved PCM ([`sample_interleaver`])
//!
//! Frames whose timestamp falls below the accurate-seek watermark are
//! reported as [`FrameDisposition::Stale`] and never reach a sink.

pub mod picture;
pub mod sample_interleaver;

pub use picture::PictureBuffer;
pub use sample_interleaver::SampleBuffer;

use crate::engine::{AudioFrame, VideoFrame};
use crate::error::Result;
use crate::format::Rational;
use crate::seek::SeekState;

use bridge_traits::host::{AudioSink, VideoSink};
use std::fmt;
use tracing::trace;

/// What happened to a processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// The frame was handed to the host (or there was no sink for it).
    Delivered,
    /// The frame precedes the seek target and was dropped.
    Stale,
}

/// Output buffers plus the sinks frames are delivered to.
pub struct FramePostProcessor {
    pictures: PictureBuffer,
    samples: SampleBuffer,
    video_sink: Box<dyn VideoSink>,
    audio_sink: Option<Box<dyn AudioSink>>,
}

impl fmt::Debug for FramePostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePostProcessor")
            .field("pictures", &self.pictures)
            .field("samples", &self.samples)
            .field("has_audio_sink", &self.audio_sink.is_some())
            .finish()
    }
}

impl FramePostProcessor {
    pub fn new(
        pictures: PictureBuffer,
        samples: SampleBuffer,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
    ) -> Self {
        Self {
            pictures,
            samples,
            video_sink,
            audio_sink,
        }
    }

    pub fn video_buffer_capacity(&self) -> usize {
        self.pictures.capacity()
    }

    pub fn audio_buffer_capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn process_video(
        &mut self,
        frame: &VideoFrame,
        time_base: Rational,
        seek: &SeekState,
    ) -> Result<FrameDisposition> {
        let packed = self.pictures.pack_yuv420p(frame)?;
        let timestamp = frame.pts as f64 * time_base.to_f64();

        if seek.suppresses(timestamp) {
            trace!(timestamp, "Dropping video frame before seek target");
            return Ok(FrameDisposition::Stale);
        }

        self.video_sink.on_video_frame(packed, timestamp);
        Ok(FrameDisposition::Delivered)
    }

    pub fn process_audio(
        &mut self,
        frame: &AudioFrame,
        time_base: Rational,
        seek: &SeekState,
    ) -> Result<FrameDisposition> {
        // The buffer tracks the largest frame seen, delivered or not
        self.samples.reserve(SampleBuffer::required_size(frame));
        let timestamp = frame.pts as f64 * time_base.to_f64();

        if seek.suppresses(timestamp) {
            trace!(timestamp, "Dropping audio frame before seek target");
            return Ok(FrameDisposition::Stale);
        }

        if let Some(sink) = self.audio_sink.as_mut() {
            let interleaved = self.samples.interleave(frame)?;
            sink.on_audio_frame(interleaved, timestamp);
        }
        Ok(FrameDisposition::Delivered)
    }
}
