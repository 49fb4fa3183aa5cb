//! # Sample Interleaver
//!
//! Converts decoded audio into channel-interleaved PCM (LRLRLR... for
//! stereo) inside a reusable, grow-only buffer.
//!
//! Sample values are copied verbatim; only the layout changes. Planar
//! frames are interleaved one sample index at a time, packed frames are
//! already interleaved and copied as-is.

use crate::engine::AudioFrame;
use crate::error::{DecodeError, Result};
use tracing::debug;

/// Growable output buffer for interleaved audio.
///
/// Nothing is allocated until the first frame arrives. The buffer then
/// starts at the configured initial size and only ever grows, to the size a
/// frame requires rounded up to a multiple of 4.
#[derive(Debug)]
pub struct SampleBuffer {
    data: Vec<u8>,
    initial_size: usize,
}

impl SampleBuffer {
    pub fn new(initial_size: usize) -> Self {
        Self {
            data: Vec::new(),
            initial_size,
        }
    }

    /// Current size of the buffer in bytes, `0` before the first frame.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes needed to hold `frame` interleaved.
    pub fn required_size(frame: &AudioFrame) -> usize {
        frame.sample_count * frame.channels as usize * frame.format.bytes_per_sample()
    }

    /// Makes room for `required` bytes.
    pub fn reserve(&mut self, required: usize) {
        if self.data.is_empty() {
            self.data = vec![0u8; self.initial_size];
        }

        if self.data.len() < required {
            let target = round_up(required, 4);
            debug!(
                from = self.data.len(),
                to = target,
                "Growing audio output buffer"
            );
            self.data.resize(target, 0);
        }
    }

    /// Interleaves `frame` into the buffer and returns the written bytes.
    pub fn interleave(&mut self, frame: &AudioFrame) -> Result<&[u8]> {
        let required = Self::required_size(frame);
        self.reserve(required);

        let width = frame.format.bytes_per_sample();
        let channels = frame.channels as usize;
        let plane_len = frame.sample_count * width;

        if frame.format.is_planar() {
            if frame.planes.len() < channels {
                return Err(DecodeError::InvalidData(format!(
                    "expected {} audio planes, got {}",
                    channels,
                    frame.planes.len()
                )));
            }
            if let Some(short) = frame.planes[..channels]
                .iter()
                .position(|plane| plane.len() < plane_len)
            {
                return Err(DecodeError::InvalidData(format!(
                    "audio plane {} holds fewer than {} samples",
                    short, frame.sample_count
                )));
            }

            let mut offset = 0;
            for sample in 0..frame.sample_count {
                let start = sample * width;
                for plane in &frame.planes[..channels] {
                    self.data[offset..offset + width].copy_from_slice(&plane[start..start + width]);
                    offset += width;
                }
            }
        } else {
            let plane = frame.planes.first().ok_or_else(|| {
                DecodeError::InvalidData("packed audio frame has no data".to_string())
            })?;
            if plane.len() < required {
                return Err(DecodeError::InvalidData(format!(
                    "packed audio frame holds {} bytes, expected {}",
                    plane.len(),
                    required
                )));
            }
            self.data[..required].copy_from_slice(&plane[..required]);
        }

        Ok(&self.data[..required])
    }
}

fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}
