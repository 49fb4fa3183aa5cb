//! # Session Lifecycle
//!
//! A [`Session`] owns everything one decoding job needs: the backing store
//! (for its whole life) and, between [`Session::open`] and
//! [`Session::close`], the opened container, stream decoders and output
//! buffers.
//!
//! ## Lifecycle
//!
//! ```text
//! init ──> open ──> send_data / decode_one_packet / seek_to ──> close ──> uninit
//!            ^                                                    │
//!            └────────────────────────────────────────────────────┘
//! ```
//!
//! The store survives `close`, so a session can be reopened over the bytes
//! already ingested.
//!
//! ## Re-entrancy
//!
//! Host callbacks run inside `open`, `decode_one_packet` and `seek_to`. They
//! must not call back into the session.

use crate::engine::{DecodeEngine, Demuxer, EngineError, MediaKind, StreamParams};
use crate::error::{DecodeError, DecodeStatus, Result};
use crate::frame::{FramePostProcessor, PictureBuffer, SampleBuffer};
use crate::format::{PixelFormat, SampleFormat};
use crate::io::IoAdapter;
use crate::pipeline::{DecodePipeline, StreamContext};
use crate::store::BackingStore;

use bridge_traits::host::{AudioSink, RangeRequester, VideoSink};
use core_runtime::config::DecoderConfig;
use serde::{Deserialize, Serialize};

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, instrument, warn};

/// Callbacks a host registers when opening a session.
pub struct HostCallbacks {
    pub video: Box<dyn VideoSink>,
    /// Audio is decoded either way; without a sink it is not delivered.
    pub audio: Option<Box<dyn AudioSink>>,
    pub range_requester: Box<dyn RangeRequester>,
}

impl HostCallbacks {
    pub fn new(
        video: impl VideoSink + 'static,
        range_requester: impl RangeRequester + 'static,
    ) -> Self {
        Self {
            video: Box::new(video),
            audio: None,
            range_requester: Box::new(range_requester),
        }
    }

    pub fn with_audio(mut self, audio: impl AudioSink + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("has_audio", &self.audio.is_some())
            .finish_non_exhaustive()
    }
}

/// Stream parameters reported when a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputParams {
    /// Container duration in milliseconds, padded slightly.
    pub duration_ms: i64,
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Interleaved format of the PCM delivered to the audio sink.
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl OutputParams {
    /// Host parameter block: `[duration_ms, pixel_format, width, height,
    /// sample_format, channels, sample_rate]`.
    pub fn to_array(&self) -> [i64; 7] {
        [
            self.duration_ms,
            self.pixel_format.code() as i64,
            self.width as i64,
            self.height as i64,
            self.sample_format.code() as i64,
            self.channels as i64,
            self.sample_rate as i64,
        ]
    }
}

/// One decoding job over one progressively delivered file.
pub struct Session {
    config: DecoderConfig,
    store: Rc<RefCell<BackingStore>>,
    pipeline: Option<DecodePipeline>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("store", &self.store.borrow())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Session {
    /// Creates a session for a file of `file_size` bytes.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::InvalidParam`] for a negative size or invalid config
    /// - [`DecodeError::OpenFile`] if the scratch file cannot be created
    #[instrument(skip(config))]
    pub fn init(file_size: i64, config: DecoderConfig) -> Result<Self> {
        if file_size < 0 {
            return Err(DecodeError::InvalidParam(format!(
                "file size must not be negative, got {}",
                file_size
            )));
        }
        config
            .validate()
            .map_err(|e| DecodeError::InvalidParam(e.to_string()))?;

        let store = BackingStore::create(&config.scratch_dir, file_size as u64)?;
        info!(file_size, "Session initialized");

        Ok(Self {
            config,
            store: Rc::new(RefCell::new(store)),
            pipeline: None,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Read access to the backing store cursors.
    pub fn store(&self) -> Ref<'_, BackingStore> {
        self.store.borrow()
    }

    pub fn pipeline(&self) -> Option<&DecodePipeline> {
        self.pipeline.as_ref()
    }

    /// Opens the container through `engine` and prepares decoding.
    ///
    /// The range requester is attached before the engine starts reading, so
    /// misses raised while probing already reach the host. On failure the
    /// partially opened state is released and the store is left intact.
    #[instrument(skip(self, engine, callbacks))]
    pub fn open(
        &mut self,
        engine: &dyn DecodeEngine,
        callbacks: HostCallbacks,
    ) -> Result<OutputParams> {
        if self.pipeline.is_some() {
            return Err(DecodeError::InvalidState(
                "session is already open".to_string(),
            ));
        }

        let HostCallbacks {
            video,
            audio,
            range_requester,
        } = callbacks;
        self.store.borrow_mut().attach_requester(range_requester);

        match self.build_pipeline(engine, video, audio) {
            Ok((pipeline, params)) => {
                info!(
                    duration_ms = params.duration_ms,
                    width = params.width,
                    height = params.height,
                    channels = params.channels,
                    sample_rate = params.sample_rate,
                    "Session opened"
                );
                self.pipeline = Some(pipeline);
                Ok(params)
            }
            Err(e) => {
                error!(error = %e, "Failed to open session");
                self.store.borrow_mut().detach_requester();
                Err(e)
            }
        }
    }

    fn build_pipeline(
        &self,
        engine: &dyn DecodeEngine,
        video_sink: Box<dyn VideoSink>,
        audio_sink: Option<Box<dyn AudioSink>>,
    ) -> Result<(DecodePipeline, OutputParams)> {
        let io = IoAdapter::new(self.store.clone(), self.config.io_buffer_size);
        let mut demuxer = engine.open_input(io)?;
        demuxer.probe_streams()?;

        let indices: Vec<usize> = demuxer.streams().iter().map(|s| s.index).collect();
        for index in indices {
            demuxer.set_discard(index, false);
        }

        let video = open_stream(demuxer.as_mut(), MediaKind::Video)?;
        let audio = open_stream(demuxer.as_mut(), MediaKind::Audio)?;

        let StreamParams::Video(video_params) = video.info.params else {
            return Err(DecodeError::InvalidData(
                "video stream has no picture parameters".to_string(),
            ));
        };
        let StreamParams::Audio(audio_params) = audio.info.params else {
            return Err(DecodeError::InvalidData(
                "audio stream has no sample parameters".to_string(),
            ));
        };
        debug!(
            video_stream = video.info.index,
            pixel_format = ?video_params.pixel_format,
            audio_stream = audio.info.index,
            sample_format = ?audio_params.sample_format,
            "Opened stream decoders"
        );

        if let Err(e) = demuxer.seek(0) {
            warn!(error = %e, "Rewind after open failed");
        }

        let frame_size = video_params
            .pixel_format
            .frame_size(video_params.width, video_params.height);
        let frames = FramePostProcessor::new(
            PictureBuffer::new(frame_size, self.config.video_buffer_frames),
            SampleBuffer::new(self.config.initial_audio_buffer_size),
            video_sink,
            audio_sink,
        );

        let duration_us = demuxer.duration_us().unwrap_or(0);
        let params = OutputParams {
            duration_ms: duration_us.saturating_add(self.config.duration_padding_us) / 1000,
            pixel_format: video_params.pixel_format,
            width: video_params.width,
            height: video_params.height,
            sample_format: audio_params.sample_format.packed(),
            channels: audio_params.channels,
            sample_rate: audio_params.sample_rate,
        };

        let pipeline = DecodePipeline::new(self.store.clone(), demuxer, video, audio, frames);
        Ok((pipeline, params))
    }

    /// Appends host bytes to the store; returns how many were kept.
    pub fn send_data(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(DecodeError::InvalidParam("no data supplied".to_string()));
        }
        Ok(self.store.borrow_mut().write(data)?)
    }

    pub fn decode_one_packet(&mut self) -> Result<DecodeStatus> {
        self.pipeline_mut()?.decode_one_packet()
    }

    /// Decodes until a frame reaches the host or decoding cannot proceed.
    pub fn decode_until_fresh(&mut self) -> Result<DecodeStatus> {
        self.pipeline_mut()?.decode_until_fresh()
    }

    pub fn seek_to(&mut self, ms: i64, accurate: bool) -> Result<()> {
        self.pipeline_mut()?.seek_to(ms, accurate)
    }

    /// Releases the opened container. Safe to call when not open.
    #[instrument(skip(self))]
    pub fn close(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
            info!("Session closed");
        }
        self.store.borrow_mut().detach_requester();
    }

    /// Closes the session and deletes its scratch file.
    #[instrument(skip(self))]
    pub fn uninit(mut self) -> Result<()> {
        self.close();
        self.store.borrow_mut().remove_scratch()?;
        info!("Session released");
        Ok(())
    }

    fn pipeline_mut(&mut self) -> Result<&mut DecodePipeline> {
        self.pipeline
            .as_mut()
            .ok_or_else(|| DecodeError::InvalidState("session is not open".to_string()))
    }
}

fn open_stream(demuxer: &mut dyn Demuxer, kind: MediaKind) -> Result<StreamContext> {
    let index = demuxer.find_best_stream(kind)?;
    let info = demuxer
        .streams()
        .iter()
        .find(|stream| stream.index == index)
        .copied()
        .ok_or(EngineError::StreamNotFound(kind))?;
    let decoder = demuxer.open_decoder(index)?;
    Ok(StreamContext { info, decoder })
}
