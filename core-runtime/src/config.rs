//! # Decoder Configuration Module
//!
//! Provides the tunables shared by every decoding session.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`DecoderConfig`] and validates it before use, so that a session never
//! starts with buffer sizes the decode path cannot work with. Configurations
//! can also be loaded from JSON supplied by the host.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::DecoderConfig;
//!
//! let config = DecoderConfig::builder()
//!     .scratch_dir(std::env::temp_dir())
//!     .io_buffer_size(64 * 1024)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.io_buffer_size, 64 * 1024);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::DecoderConfig;
//!
//! // A zero-sized transfer buffer can never make progress
//! let config = DecoderConfig::builder()
//!     .io_buffer_size(0)
//!     .build()
//!     .expect("Should fail - empty transfer buffer");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default transfer buffer handed to the decode engine (32 KiB).
pub const DEFAULT_IO_BUFFER_SIZE: usize = 32 * 1024;

/// Default first allocation of the interleaved audio buffer (128 KiB).
pub const DEFAULT_INITIAL_AUDIO_BUFFER_SIZE: usize = 128 * 1024;

/// Pictures of headroom in the video output buffer.
pub const DEFAULT_VIDEO_BUFFER_FRAMES: usize = 3;

/// Padding added to the container duration before it is reported, in
/// microseconds.
pub const DEFAULT_DURATION_PADDING_US: i64 = 5_000;

const MAX_IO_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Settings for a decoding session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Directory holding the scratch file that backs the byte store.
    ///
    /// Default: the system temporary directory.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Size of the transfer buffer between the byte store and the engine.
    #[serde(default = "default_io_buffer_size")]
    pub io_buffer_size: usize,

    /// First allocation of the audio output buffer; it only grows afterwards.
    #[serde(default = "default_initial_audio_buffer_size")]
    pub initial_audio_buffer_size: usize,

    /// Number of pictures the video output buffer can hold.
    #[serde(default = "default_video_buffer_frames")]
    pub video_buffer_frames: usize,

    /// Padding added to the reported duration, in microseconds.
    #[serde(default = "default_duration_padding_us")]
    pub duration_padding_us: i64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            io_buffer_size: default_io_buffer_size(),
            initial_audio_buffer_size: default_initial_audio_buffer_size(),
            video_buffer_frames: default_video_buffer_frames(),
            duration_padding_us: default_duration_padding_us(),
        }
    }
}

impl DecoderConfig {
    /// Creates a new builder for constructing a `DecoderConfig`.
    pub fn builder() -> DecoderConfigBuilder {
        DecoderConfigBuilder::default()
    }

    /// Parses a configuration from JSON, filling omitted fields with
    /// defaults, and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid decoder config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Scratch directory is not empty
    /// - Transfer buffer is non-empty and at most 16 MiB
    /// - Audio buffer initial size is non-zero
    /// - Video buffer holds at least one picture
    /// - Duration padding is not negative
    pub fn validate(&self) -> Result<()> {
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Scratch directory cannot be empty".to_string(),
            ));
        }

        if self.io_buffer_size == 0 {
            return Err(Error::Config(
                "IO buffer size must be greater than 0".to_string(),
            ));
        }

        if self.io_buffer_size > MAX_IO_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "IO buffer size exceeds maximum of {} bytes",
                MAX_IO_BUFFER_SIZE
            )));
        }

        if self.initial_audio_buffer_size == 0 {
            return Err(Error::Config(
                "Initial audio buffer size must be greater than 0".to_string(),
            ));
        }

        if self.video_buffer_frames == 0 {
            return Err(Error::Config(
                "Video buffer must hold at least one frame".to_string(),
            ));
        }

        if self.duration_padding_us < 0 {
            return Err(Error::Config(
                "Duration padding cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`DecoderConfig`].
#[derive(Debug, Default)]
pub struct DecoderConfigBuilder {
    scratch_dir: Option<PathBuf>,
    io_buffer_size: Option<usize>,
    initial_audio_buffer_size: Option<usize>,
    video_buffer_frames: Option<usize>,
    duration_padding_us: Option<i64>,
}

impl DecoderConfigBuilder {
    /// Sets the directory for scratch files.
    pub fn scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Sets the engine transfer buffer size in bytes.
    pub fn io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = Some(size);
        self
    }

    /// Sets the first allocation of the audio output buffer in bytes.
    pub fn initial_audio_buffer_size(mut self, size: usize) -> Self {
        self.initial_audio_buffer_size = Some(size);
        self
    }

    /// Sets how many pictures the video output buffer holds.
    pub fn video_buffer_frames(mut self, frames: usize) -> Self {
        self.video_buffer_frames = Some(frames);
        self
    }

    /// Sets the padding added to the reported duration, in microseconds.
    pub fn duration_padding_us(mut self, padding: i64) -> Self {
        self.duration_padding_us = Some(padding);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<DecoderConfig> {
        let defaults = DecoderConfig::default();
        let config = DecoderConfig {
            scratch_dir: self.scratch_dir.unwrap_or(defaults.scratch_dir),
            io_buffer_size: self.io_buffer_size.unwrap_or(defaults.io_buffer_size),
            initial_audio_buffer_size: self
                .initial_audio_buffer_size
                .unwrap_or(defaults.initial_audio_buffer_size),
            video_buffer_frames: self
                .video_buffer_frames
                .unwrap_or(defaults.video_buffer_frames),
            duration_padding_us: self
                .duration_padding_us
                .unwrap_or(defaults.duration_padding_us),
        };

        config.validate()?;
        Ok(config)
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_io_buffer_size() -> usize {
    DEFAULT_IO_BUFFER_SIZE
}

fn default_initial_audio_buffer_size() -> usize {
    DEFAULT_INITIAL_AUDIO_BUFFER_SIZE
}

fn default_video_buffer_frames() -> usize {
    DEFAULT_VIDEO_BUFFER_FRAMES
}

fn default_duration_padding_us() -> i64 {
    DEFAULT_DURATION_PADDING_US
}
