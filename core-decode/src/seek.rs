//! # Seek Controller
//!
//! Translates "seek to time T" into an engine seek, and arranges for frames
//! decoded between the landing keyframe and T to be suppressed when the
//! caller asked for an accurate seek.
//!
//! The data for T may not be held locally yet. After repositioning, one
//! packet read is forced so the engine walks through the I/O adapter: if the
//! landing offset is not cached, the store raises exactly one range request
//! to the host during this call. A packet that does come back is kept and
//! decoded by the next decode call rather than thrown away.

use crate::engine::ReadOutcome;
use crate::error::{DecodeError, Result};
use crate::pipeline::DecodePipeline;

use tracing::{debug, instrument, warn};

/// Accurate-seek watermark.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeekState {
    /// Whether frames before `begin_time` are suppressed.
    pub accurate: bool,
    /// Seek target in seconds.
    pub begin_time: f64,
}

impl SeekState {
    /// Whether a frame at `timestamp` seconds must be dropped.
    pub fn suppresses(&self, timestamp: f64) -> bool {
        self.accurate && timestamp < self.begin_time
    }
}

impl DecodePipeline {
    /// Seeks every stream to the last keyframe at or before `ms`.
    ///
    /// On engine failure the seek state is left untouched.
    #[instrument(skip(self))]
    pub fn seek_to(&mut self, ms: i64, accurate: bool) -> Result<()> {
        if ms < 0 {
            return Err(DecodeError::InvalidParam(format!(
                "seek target must not be negative, got {} ms",
                ms
            )));
        }

        let target_us = ms.saturating_mul(1000);
        if let Err(e) = self.demuxer.seek(target_us) {
            warn!(error = %e, "Engine seek failed");
            return Err(DecodeError::Engine(e));
        }

        self.video.decoder.flush();
        self.audio.decoder.flush();
        self.pending = None;
        self.seek_state = SeekState {
            accurate,
            begin_time: ms as f64 / 1000.0,
        };

        match self.demuxer.read_packet() {
            Ok(ReadOutcome::Packet(packet)) => {
                debug!(stream = packet.stream_index, pts = packet.pts, "Holding packet read after seek");
                self.pending = Some(packet);
            }
            Ok(ReadOutcome::EndOfStream) => debug!("Seek landed at end of stream"),
            Err(e) if e.is_would_block() => debug!("Seek target not cached yet"),
            Err(e) => warn!(error = %e, "Read after seek failed"),
        }

        Ok(())
    }
}
