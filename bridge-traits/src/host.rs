//! Frame and data-request callbacks implemented by the host.
//!
//! Buffers handed to the sinks are borrowed from the core's output buffers
//! and are only valid for the duration of the call. Hosts that need to keep
//! the data must copy it.

/// Receives decoded pictures.
///
/// `data` holds a tightly packed planar YUV 4:2:0 picture: the full
/// resolution luma plane followed by the two chroma planes. `timestamp` is
/// the presentation time in seconds.
pub trait VideoSink {
    fn on_video_frame(&mut self, data: &[u8], timestamp: f64);
}

/// Receives decoded audio.
///
/// `data` holds channel-interleaved PCM in the packed sample format reported
/// when the session was opened.
pub trait AudioSink {
    fn on_audio_frame(&mut self, data: &[u8], timestamp: f64);
}

/// Asks the host to deliver the file starting at `offset`.
///
/// Called at most once per cache miss. The host answers later by feeding
/// bytes from `offset` onwards through `send_data`; it must not do so from
/// inside this call.
pub trait RangeRequester {
    fn request_range(&mut self, offset: u64);
}

impl<F> VideoSink for F
where
    F: FnMut(&[u8], f64),
{
    fn on_video_frame(&mut self, data: &[u8], timestamp: f64) {
        self(data, timestamp)
    }
}

impl<F> AudioSink for F
where
    F: FnMut(&[u8], f64),
{
    fn on_audio_frame(&mut self, data: &[u8], timestamp: f64) {
        self(data, timestamp)
    }
}

impl<F> RangeRequester for F
where
    F: FnMut(u64),
{
    fn request_range(&mut self, offset: u64) {
        self(offset)
    }
}
