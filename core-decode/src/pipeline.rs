//! # Decode Pipeline
//!
//! Drives the engine one packet at a time and dispatches decoded frames to
//! the post-processor.
//!
//! A decode step never blocks. When the backing store has nothing unread
//! the step returns [`DecodeStatus::NeedMoreData`] without touching the
//! container; when the container read itself runs short (the adapter
//! reported `WouldBlock`) the step reports plain success and the engine
//! retries the read on the next call.

use crate::engine::{
    DecodedFrame, Demuxer, MediaKind, Packet, ReadOutcome, Receive, StreamDecoder, StreamInfo,
};
use crate::error::{DecodeError, DecodeStatus, Result};
use crate::frame::{FrameDisposition, FramePostProcessor};
use crate::seek::SeekState;
use crate::store::BackingStore;

use bytes::Buf;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// An opened stream and its decoder.
pub struct StreamContext {
    pub info: StreamInfo,
    pub decoder: Box<dyn StreamDecoder>,
}

impl fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Everything that exists between `open` and `close`.
pub struct DecodePipeline {
    pub(crate) store: Rc<RefCell<BackingStore>>,
    pub(crate) demuxer: Box<dyn Demuxer>,
    pub(crate) video: StreamContext,
    pub(crate) audio: StreamContext,
    pub(crate) frames: FramePostProcessor,
    /// Packet read ahead by the seek path, decoded before anything else.
    pub(crate) pending: Option<Packet>,
    pub(crate) seek_state: SeekState,
}

impl fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("frames", &self.frames)
            .field("pending", &self.pending.as_ref().map(|p| p.stream_index))
            .field("seek_state", &self.seek_state)
            .finish()
    }
}

impl DecodePipeline {
    pub fn new(
        store: Rc<RefCell<BackingStore>>,
        demuxer: Box<dyn Demuxer>,
        video: StreamContext,
        audio: StreamContext,
        frames: FramePostProcessor,
    ) -> Self {
        Self {
            store,
            demuxer,
            video,
            audio,
            frames,
            pending: None,
            seek_state: SeekState::default(),
        }
    }

    pub fn seek_state(&self) -> SeekState {
        self.seek_state
    }

    pub fn has_pending_packet(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frames(&self) -> &FramePostProcessor {
        &self.frames
    }

    /// Reads and decodes at most one packet.
    pub fn decode_one_packet(&mut self) -> Result<DecodeStatus> {
        let packet = match self.pending.take() {
            Some(packet) => packet,
            None => {
                {
                    let store = self.store.borrow();
                    if store.unread() == 0 && !store.is_complete() {
                        trace!(read_pos = store.read_pos(), "Waiting for data");
                        return Ok(DecodeStatus::NeedMoreData);
                    }
                }

                match self.demuxer.read_packet() {
                    Ok(ReadOutcome::Packet(packet)) => packet,
                    Ok(ReadOutcome::EndOfStream) => {
                        debug!("End of container reached");
                        return Ok(DecodeStatus::Eof);
                    }
                    Err(e) if e.is_would_block() => {
                        trace!("Packet read ran out of data");
                        return Ok(DecodeStatus::Success);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read packet");
                        return Ok(DecodeStatus::Success);
                    }
                }
            }
        };

        self.decode_whole_packet(packet)
    }

    /// Repeats [`decode_one_packet`](Self::decode_one_packet) while it only
    /// produces frames suppressed by accurate seek.
    pub fn decode_until_fresh(&mut self) -> Result<DecodeStatus> {
        loop {
            let status = self.decode_one_packet()?;
            if status != DecodeStatus::OldFrame {
                return Ok(status);
            }
        }
    }

    fn decode_whole_packet(&mut self, mut packet: Packet) -> Result<DecodeStatus> {
        while !packet.data.is_empty() {
            let (status, consumed) = self.decode_packet(&packet)?;
            if status != DecodeStatus::Success {
                return Ok(status);
            }
            if consumed == 0 {
                warn!(stream = packet.stream_index, "Decoder consumed nothing, dropping packet");
                break;
            }
            packet.data.advance(consumed.min(packet.data.len()));
        }
        Ok(DecodeStatus::Success)
    }

    /// Submits `packet` to the decoder of its stream and drains the frames
    /// it produces.
    ///
    /// Returns the outcome and how many packet bytes the decoder consumed.
    pub fn decode_packet(&mut self, packet: &Packet) -> Result<(DecodeStatus, usize)> {
        let stream = if packet.stream_index == self.video.info.index {
            &mut self.video
        } else if packet.stream_index == self.audio.info.index {
            &mut self.audio
        } else {
            return Err(DecodeError::InvalidData(format!(
                "packet for unknown stream {}",
                packet.stream_index
            )));
        };

        let consumed = stream.decoder.send_packet(packet)?;

        loop {
            let frame = match stream.decoder.receive_frame()? {
                Receive::NeedInput => return Ok((DecodeStatus::Success, consumed)),
                Receive::EndOfStream => return Ok((DecodeStatus::Eof, consumed)),
                Receive::Frame(frame) => frame,
            };

            let time_base = stream.info.time_base;
            let disposition = match (&frame, stream.info.kind()) {
                (DecodedFrame::Video(video), MediaKind::Video) => {
                    self.frames.process_video(video, time_base, &self.seek_state)?
                }
                (DecodedFrame::Audio(audio), MediaKind::Audio) => {
                    self.frames.process_audio(audio, time_base, &self.seek_state)?
                }
                _ => {
                    return Err(DecodeError::InvalidData(format!(
                        "stream {} produced a frame of the wrong kind",
                        packet.stream_index
                    )))
                }
            };

            if disposition == FrameDisposition::Stale {
                return Ok((DecodeStatus::OldFrame, consumed));
            }
        }
    }

    /// Marks the opened streams discarded and releases the pipeline.
    pub fn shutdown(mut self) {
        self.demuxer.set_discard(self.video.info.index, true);
        self.demuxer.set_discard(self.audio.info.index, true);
        debug!("Streams discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        AudioParams, EngineError, EngineResult, Plane, StreamParams, VideoFrame, VideoParams,
    };
    use crate::format::{PixelFormat, Rational, SampleFormat};
    use crate::frame::{PictureBuffer, SampleBuffer};
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::VecDeque;
    use std::io;

    mock! {
        Decoder {}
        impl StreamDecoder for Decoder {
            fn send_packet(&mut self, packet: &Packet) -> EngineResult<usize>;
            fn receive_frame(&mut self) -> EngineResult<Receive>;
            fn flush(&mut self);
        }
    }

    /// Demuxer replaying a fixed script of read results.
    struct ScriptedDemuxer {
        reads: Rc<RefCell<VecDeque<EngineResult<ReadOutcome>>>>,
        read_calls: Rc<RefCell<usize>>,
    }

    impl Demuxer for ScriptedDemuxer {
        fn probe_streams(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn streams(&self) -> &[StreamInfo] {
            &[]
        }

        fn duration_us(&self) -> Option<i64> {
            None
        }

        fn open_decoder(&mut self, stream_index: usize) -> EngineResult<Box<dyn StreamDecoder>> {
            Err(EngineError::DecoderUnavailable(stream_index))
        }

        fn set_discard(&mut self, _stream_index: usize, _discard: bool) {}

        fn read_packet(&mut self) -> EngineResult<ReadOutcome> {
            *self.read_calls.borrow_mut() += 1;
            self.reads
                .borrow_mut()
                .pop_front()
                .unwrap_or(Ok(ReadOutcome::EndOfStream))
        }

        fn seek(&mut self, _target_us: i64) -> EngineResult<()> {
            Ok(())
        }
    }

    struct Harness {
        pipeline: DecodePipeline,
        reads: Rc<RefCell<VecDeque<EngineResult<ReadOutcome>>>>,
        read_calls: Rc<RefCell<usize>>,
        video_frames: Rc<RefCell<Vec<f64>>>,
    }

    fn video_info() -> StreamInfo {
        StreamInfo {
            index: 0,
            time_base: Rational::new(1, 1000),
            params: StreamParams::Video(VideoParams {
                pixel_format: PixelFormat::Yuv420p,
                width: 2,
                height: 2,
            }),
        }
    }

    fn audio_info() -> StreamInfo {
        StreamInfo {
            index: 1,
            time_base: Rational::new(1, 1000),
            params: StreamParams::Audio(AudioParams {
                sample_format: SampleFormat::S16,
                channels: 1,
                sample_rate: 8000,
            }),
        }
    }

    fn picture(pts: i64) -> Receive {
        Receive::Frame(DecodedFrame::Video(VideoFrame {
            format: PixelFormat::Yuv420p,
            width: 2,
            height: 2,
            planes: vec![
                Plane { data: Bytes::from_static(&[0; 4]), stride: 2 },
                Plane { data: Bytes::from_static(&[0]), stride: 1 },
                Plane { data: Bytes::from_static(&[0]), stride: 1 },
            ],
            pts,
        }))
    }

    fn idle_decoder() -> MockDecoder {
        let mut decoder = MockDecoder::new();
        decoder.expect_send_packet().never();
        decoder
    }

    fn scripted_decoder(script: Vec<EngineResult<Receive>>) -> MockDecoder {
        let mut script: VecDeque<_> = script.into();
        let mut decoder = MockDecoder::new();
        decoder
            .expect_send_packet()
            .returning(|packet| Ok(packet.data.len()));
        decoder
            .expect_receive_frame()
            .returning(move || script.pop_front().unwrap_or(Ok(Receive::NeedInput)));
        decoder
    }

    fn harness(video: MockDecoder, audio: MockDecoder, ingested: &[u8], capacity: u64) -> Harness {
        let store = Rc::new(RefCell::new(
            BackingStore::create(&std::env::temp_dir(), capacity).unwrap(),
        ));
        if !ingested.is_empty() {
            store.borrow_mut().write(ingested).unwrap();
        }

        let reads = Rc::new(RefCell::new(VecDeque::new()));
        let read_calls = Rc::new(RefCell::new(0));
        let demuxer = ScriptedDemuxer {
            reads: reads.clone(),
            read_calls: read_calls.clone(),
        };

        let video_frames = Rc::new(RefCell::new(Vec::new()));
        let seen = video_frames.clone();
        let frames = FramePostProcessor::new(
            PictureBuffer::new(PixelFormat::Yuv420p.frame_size(2, 2), 3),
            SampleBuffer::new(64),
            Box::new(move |_: &[u8], ts: f64| seen.borrow_mut().push(ts)),
            None,
        );

        let pipeline = DecodePipeline::new(
            store,
            Box::new(demuxer),
            StreamContext {
                info: video_info(),
                decoder: Box::new(video),
            },
            StreamContext {
                info: audio_info(),
                decoder: Box::new(audio),
            },
            frames,
        );

        Harness {
            pipeline,
            reads,
            read_calls,
            video_frames,
        }
    }

    fn packet(stream_index: usize, len: usize) -> ReadOutcome {
        ReadOutcome::Packet(Packet {
            stream_index,
            data: Bytes::from(vec![0u8; len]),
            pts: 0,
        })
    }

    #[test]
    fn test_need_more_data_without_container_read() {
        let mut h = harness(idle_decoder(), idle_decoder(), &[], 100);

        assert_eq!(
            h.pipeline.decode_one_packet().unwrap(),
            DecodeStatus::NeedMoreData
        );
        assert_eq!(*h.read_calls.borrow(), 0);
    }

    #[test]
    fn test_decodes_video_packet() {
        let mut h = harness(
            scripted_decoder(vec![Ok(picture(500)), Ok(Receive::NeedInput)]),
            idle_decoder(),
            &[0u8; 10],
            100,
        );
        h.reads.borrow_mut().push_back(Ok(packet(0, 8)));

        assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Success);
        assert_eq!(*h.video_frames.borrow(), vec![0.5]);
    }

    #[test]
    fn test_complete_store_reaches_eof() {
        let mut h = harness(idle_decoder(), idle_decoder(), &[0u8; 4], 4);
        // Everything has been read already
        let mut buf = [0u8; 4];
        h.pipeline.store.borrow_mut().read(&mut buf).unwrap();

        assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Eof);
    }

    #[test]
    fn test_failed_or_empty_reads_report_success() {
        let mut h = harness(idle_decoder(), idle_decoder(), &[0u8; 10], 100);
        h.reads
            .borrow_mut()
            .push_back(Err(EngineError::Io(io::ErrorKind::WouldBlock.into())));
        h.reads
            .borrow_mut()
            .push_back(Err(EngineError::InvalidData("garbage".into())));
        h.reads.borrow_mut().push_back(Ok(packet(0, 0)));

        for _ in 0..3 {
            assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Success);
        }
    }

    #[test]
    fn test_unknown_stream_is_invalid_data() {
        let mut h = harness(idle_decoder(), idle_decoder(), &[0u8; 10], 100);
        h.reads.borrow_mut().push_back(Ok(packet(7, 4)));

        let err = h.pipeline.decode_one_packet().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData(_)));
    }

    #[test]
    fn test_decoder_end_of_stream_is_eof() {
        let mut h = harness(
            idle_decoder(),
            scripted_decoder(vec![Ok(Receive::EndOfStream)]),
            &[0u8; 10],
            100,
        );
        h.reads.borrow_mut().push_back(Ok(packet(1, 4)));

        assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Eof);
    }

    #[test]
    fn test_send_failure_is_engine_error() {
        let mut video = MockDecoder::new();
        video
            .expect_send_packet()
            .returning(|_| Err(EngineError::Other("corrupt".into())));
        let mut h = harness(video, idle_decoder(), &[0u8; 10], 100);
        h.reads.borrow_mut().push_back(Ok(packet(0, 4)));

        let err = h.pipeline.decode_one_packet().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_partial_consumption_resubmits_remainder() {
        let mut video = MockDecoder::new();
        // 10 bytes consumed 4 at a time
        video.expect_send_packet().times(3).returning(|_| Ok(4));
        video
            .expect_receive_frame()
            .returning(|| Ok(Receive::NeedInput));

        let mut h = harness(video, idle_decoder(), &[0u8; 10], 100);
        h.reads.borrow_mut().push_back(Ok(packet(0, 10)));

        assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Success);
    }

    #[test]
    fn test_stale_frames_and_decode_until_fresh() {
        let mut h = harness(
            scripted_decoder(vec![
                Ok(picture(1000)),
                Ok(picture(1500)),
                Ok(picture(2000)),
                Ok(Receive::NeedInput),
            ]),
            idle_decoder(),
            &[0u8; 10],
            100,
        );
        h.pipeline.seek_state = SeekState {
            accurate: true,
            begin_time: 2.0,
        };
        for _ in 0..3 {
            h.reads.borrow_mut().push_back(Ok(packet(0, 4)));
        }

        assert_eq!(
            h.pipeline.decode_one_packet().unwrap(),
            DecodeStatus::OldFrame
        );
        assert_eq!(
            h.pipeline.decode_until_fresh().unwrap(),
            DecodeStatus::Success
        );
        assert_eq!(*h.video_frames.borrow(), vec![2.0]);
    }

    #[test]
    fn test_pending_packet_decoded_first() {
        let mut h = harness(
            scripted_decoder(vec![Ok(picture(0)), Ok(Receive::NeedInput)]),
            idle_decoder(),
            &[],
            100,
        );
        h.pipeline.pending = Some(Packet {
            stream_index: 0,
            data: Bytes::from_static(&[1, 2, 3]),
            pts: 0,
        });

        // No unread bytes, yet the pending packet is still decoded
        assert_eq!(h.pipeline.decode_one_packet().unwrap(), DecodeStatus::Success);
        assert!(!h.pipeline.has_pending_packet());
        assert_eq!(*h.read_calls.borrow(), 0);
        assert_eq!(h.video_frames.borrow().len(), 1);
    }
}
