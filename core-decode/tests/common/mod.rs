//! Toy container format and decode engine shared by the integration tests.
//!
//! Layout (little endian):
//!
//! ```text
//! "TOY1"
//! duration_us: i64
//! video: width u32, height u32, pixel_format i32, time_base num i32, den i32
//! audio: sample_format i32, channels u16, sample_rate u32, time_base num i32, den i32
//! packet_count: u32
//! packet_count x (offset u64, size u32, stream u8, pts i64, keyframe u8)
//! payloads at their indexed offsets
//! ```
//!
//! Video payloads start with a fill byte used for every decoded sample.
//! Audio payloads are a `u32` sample count followed by a fill byte.

#![allow(dead_code)]

use bytes::Bytes;
use core_decode::engine::{
    AudioFrame, AudioParams, DecodeEngine, DecodedFrame, Demuxer, EngineError, EngineResult,
    Packet, Plane, ReadOutcome, Receive, StreamDecoder, StreamInfo, StreamParams, VideoFrame,
    VideoParams, ENGINE_LOG_TARGET,
};
use core_decode::format::{PixelFormat, Rational, SampleFormat};
use core_decode::io::IoAdapter;

use std::collections::{HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};

pub const MAGIC: &[u8; 4] = b"TOY1";
pub const HEADER_LEN: usize = 4 + 8 + 20 + 18 + 4;
pub const ENTRY_LEN: usize = 8 + 4 + 1 + 8 + 1;
pub const VIDEO_STREAM: usize = 0;
pub const AUDIO_STREAM: usize = 1;

/// Stride padding added to every decoded plane row.
const STRIDE_PAD: usize = 16;

#[derive(Debug, Clone)]
pub struct ToyPacket {
    pub stream: usize,
    pub pts_ms: i64,
    pub keyframe: bool,
    pub payload: Vec<u8>,
    /// Absolute offset for the payload; must not overlap earlier payloads.
    pub place_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ToyFile {
    pub duration_us: i64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub packets: Vec<ToyPacket>,
}

impl ToyFile {
    pub fn new(width: u32, height: u32, channels: u16) -> Self {
        Self {
            duration_us: 0,
            width,
            height,
            pixel_format: PixelFormat::Yuv420p,
            sample_format: SampleFormat::F32Planar,
            channels,
            sample_rate: 48_000,
            packets: Vec::new(),
        }
    }

    /// `duration_ms` of content: a video packet every `frame_ms` (keyframe
    /// every `gop_ms`) interleaved with an audio packet every `audio_ms`.
    pub fn interleaved(
        duration_ms: i64,
        frame_ms: i64,
        audio_ms: i64,
        gop_ms: i64,
        video_payload_len: usize,
    ) -> Self {
        let mut file = Self::new(64, 48, 2);
        file.duration_us = duration_ms * 1000;

        let mut video_pts = 0;
        let mut audio_pts = 0;
        while video_pts < duration_ms || audio_pts < duration_ms {
            // Video first at equal timestamps
            if video_pts < duration_ms && (video_pts <= audio_pts || audio_pts >= duration_ms) {
                file.push_video(video_pts, video_pts % gop_ms == 0, video_payload_len);
                video_pts += frame_ms;
            } else {
                file.push_audio(audio_pts, 256);
                audio_pts += audio_ms;
            }
        }
        file
    }

    pub fn push_video(&mut self, pts_ms: i64, keyframe: bool, payload_len: usize) -> &mut Self {
        let mut payload = vec![0u8; payload_len.max(1)];
        payload[0] = (pts_ms / 40) as u8;
        self.packets.push(ToyPacket {
            stream: VIDEO_STREAM,
            pts_ms,
            keyframe,
            payload,
            place_at: None,
        });
        self
    }

    pub fn push_audio(&mut self, pts_ms: i64, samples: u32) -> &mut Self {
        let mut payload = samples.to_le_bytes().to_vec();
        payload.push((pts_ms / 20) as u8);
        self.packets.push(ToyPacket {
            stream: AUDIO_STREAM,
            pts_ms,
            keyframe: true,
            payload,
            place_at: None,
        });
        self
    }

    /// Moves the payload of the most recently pushed packet to `offset`.
    pub fn place_last_at(&mut self, offset: u64) -> &mut Self {
        if let Some(packet) = self.packets.last_mut() {
            packet.place_at = Some(offset);
        }
        self
    }

    pub fn count(&self, stream: usize) -> usize {
        self.packets.iter().filter(|p| p.stream == stream).count()
    }

    /// Payload offset of every packet, in packet order.
    pub fn layout(&self) -> Vec<u64> {
        let mut cursor = (HEADER_LEN + ENTRY_LEN * self.packets.len()) as u64;
        self.packets
            .iter()
            .map(|packet| {
                let offset = packet.place_at.unwrap_or(cursor).max(cursor);
                cursor = offset + packet.payload.len() as u64;
                offset
            })
            .collect()
    }

    /// Payload offset of the first packet of `stream` at `pts_ms`.
    pub fn offset_of(&self, stream: usize, pts_ms: i64) -> Option<u64> {
        let layout = self.layout();
        self.packets
            .iter()
            .position(|p| p.stream == stream && p.pts_ms == pts_ms)
            .map(|i| layout[i])
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = self.layout();
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.duration_us.to_le_bytes());

        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.pixel_format.code().to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&1000i32.to_le_bytes());

        out.extend_from_slice(&self.sample_format.code().to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&1000i32.to_le_bytes());

        out.extend_from_slice(&(self.packets.len() as u32).to_le_bytes());
        for (packet, offset) in self.packets.iter().zip(&layout) {
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&(packet.payload.len() as u32).to_le_bytes());
            out.push(packet.stream as u8);
            out.extend_from_slice(&packet.pts_ms.to_le_bytes());
            out.push(packet.keyframe as u8);
        }
        assert_eq!(out.len(), HEADER_LEN + ENTRY_LEN * self.packets.len());

        for (packet, offset) in self.packets.iter().zip(&layout) {
            let start = *offset as usize;
            if out.len() < start {
                out.resize(start, 0);
            }
            out.extend_from_slice(&packet.payload);
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    size: u32,
    stream: usize,
    pts: i64,
    keyframe: bool,
}

/// Engine understanding the toy format.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToyEngine {
    /// Every seek fails.
    pub fail_seek: bool,
}

impl ToyEngine {
    pub fn failing_seeks() -> Self {
        Self { fail_seek: true }
    }
}

fn le_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn le_i64(bytes: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

impl DecodeEngine for ToyEngine {
    fn open_input(&self, mut io: IoAdapter) -> EngineResult<Box<dyn Demuxer>> {
        let mut header = [0u8; HEADER_LEN];
        io.seek(SeekFrom::Start(0))?;
        io.read_exact(&mut header)?;
        if &header[..4] != MAGIC {
            return Err(EngineError::InvalidData("bad magic".to_string()));
        }

        let duration_us = le_i64(&header, 4);
        let pixel_format = PixelFormat::from_code(le_i32(&header, 20))
            .ok_or_else(|| EngineError::InvalidData("unknown pixel format".to_string()))?;
        let sample_format = SampleFormat::from_code(le_i32(&header, 32))
            .ok_or_else(|| EngineError::InvalidData("unknown sample format".to_string()))?;

        let streams = vec![
            StreamInfo {
                index: VIDEO_STREAM,
                time_base: Rational::new(le_i32(&header, 24), le_i32(&header, 28)),
                params: StreamParams::Video(VideoParams {
                    pixel_format,
                    width: le_u32(&header, 12),
                    height: le_u32(&header, 16),
                }),
            },
            StreamInfo {
                index: AUDIO_STREAM,
                time_base: Rational::new(le_i32(&header, 42), le_i32(&header, 46)),
                params: StreamParams::Audio(AudioParams {
                    sample_format,
                    channels: u16::from_le_bytes([header[36], header[37]]),
                    sample_rate: le_u32(&header, 38),
                }),
            },
        ];
        let packet_count = le_u32(&header, 50) as usize;

        tracing::debug!(target: ENGINE_LOG_TARGET, packet_count, "Opened toy container");

        Ok(Box::new(ToyDemuxer {
            io,
            duration_us,
            streams,
            packet_count,
            index: Vec::new(),
            cursor: 0,
            discarded: HashSet::new(),
            fail_seek: self.fail_seek,
        }))
    }
}

pub struct ToyDemuxer {
    io: IoAdapter,
    duration_us: i64,
    streams: Vec<StreamInfo>,
    packet_count: usize,
    index: Vec<IndexEntry>,
    cursor: usize,
    discarded: HashSet<usize>,
    fail_seek: bool,
}

impl ToyDemuxer {
    fn pts_us(&self, entry: &IndexEntry) -> i64 {
        let tb = self.streams[entry.stream].time_base;
        (entry.pts as f64 * tb.to_f64() * 1_000_000.0).round() as i64
    }
}

impl Demuxer for ToyDemuxer {
    fn probe_streams(&mut self) -> EngineResult<()> {
        let mut raw = vec![0u8; self.packet_count * ENTRY_LEN];
        self.io.seek(SeekFrom::Start(HEADER_LEN as u64))?;
        self.io.read_exact(&mut raw)?;

        self.index = raw
            .chunks(ENTRY_LEN)
            .map(|entry| IndexEntry {
                offset: le_u64(entry, 0),
                size: le_u32(entry, 8),
                stream: entry[12] as usize,
                pts: le_i64(entry, 13),
                keyframe: entry[21] != 0,
            })
            .collect();
        self.cursor = 0;
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn duration_us(&self) -> Option<i64> {
        (self.duration_us > 0).then_some(self.duration_us)
    }

    fn open_decoder(&mut self, stream_index: usize) -> EngineResult<Box<dyn StreamDecoder>> {
        match self.streams.get(stream_index).map(|s| s.params) {
            Some(StreamParams::Video(params)) => Ok(Box::new(ToyVideoDecoder {
                params,
                frames: VecDeque::new(),
            })),
            Some(StreamParams::Audio(params)) => Ok(Box::new(ToyAudioDecoder {
                params,
                frames: VecDeque::new(),
            })),
            None => Err(EngineError::DecoderUnavailable(stream_index)),
        }
    }

    fn set_discard(&mut self, stream_index: usize, discard: bool) {
        if discard {
            self.discarded.insert(stream_index);
        } else {
            self.discarded.remove(&stream_index);
        }
    }

    fn read_packet(&mut self) -> EngineResult<ReadOutcome> {
        while let Some(entry) = self.index.get(self.cursor).copied() {
            if self.discarded.contains(&entry.stream) {
                self.cursor += 1;
                continue;
            }

            // Errors leave the cursor in place so the read is retried
            let mut data = vec![0u8; entry.size as usize];
            self.io.seek(SeekFrom::Start(entry.offset))?;
            self.io.read_exact(&mut data)?;

            self.cursor += 1;
            return Ok(ReadOutcome::Packet(Packet {
                stream_index: entry.stream,
                data: Bytes::from(data),
                pts: entry.pts,
            }));
        }
        Ok(ReadOutcome::EndOfStream)
    }

    fn seek(&mut self, target_us: i64) -> EngineResult<()> {
        if self.fail_seek {
            return Err(EngineError::Other("seeking disabled".to_string()));
        }

        self.cursor = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, e)| e.stream == VIDEO_STREAM && e.keyframe && self.pts_us(e) <= target_us)
            .map(|(i, _)| i)
            .last()
            .unwrap_or(0);
        Ok(())
    }
}

struct ToyVideoDecoder {
    params: VideoParams,
    frames: VecDeque<VideoFrame>,
}

fn padded_plane(width: usize, height: usize, value: u8) -> Plane {
    let stride = width + STRIDE_PAD;
    let mut data = vec![0xA5u8; stride * height];
    for row in data.chunks_mut(stride) {
        row[..width].fill(value);
    }
    Plane {
        data: Bytes::from(data),
        stride,
    }
}

impl StreamDecoder for ToyVideoDecoder {
    fn send_packet(&mut self, packet: &Packet) -> EngineResult<usize> {
        let fill = *packet
            .data
            .first()
            .ok_or_else(|| EngineError::InvalidData("empty video packet".to_string()))?;

        let w = self.params.width as usize;
        let h = self.params.height as usize;
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        self.frames.push_back(VideoFrame {
            format: self.params.pixel_format,
            width: self.params.width,
            height: self.params.height,
            planes: vec![
                padded_plane(w, h, fill),
                padded_plane(cw, ch, fill),
                padded_plane(cw, ch, fill),
            ],
            pts: packet.pts,
        });
        Ok(packet.data.len())
    }

    fn receive_frame(&mut self) -> EngineResult<Receive> {
        Ok(self
            .frames
            .pop_front()
            .map(|frame| Receive::Frame(DecodedFrame::Video(frame)))
            .unwrap_or(Receive::NeedInput))
    }

    fn flush(&mut self) {
        self.frames.clear();
    }
}

struct ToyAudioDecoder {
    params: AudioParams,
    frames: VecDeque<AudioFrame>,
}

impl StreamDecoder for ToyAudioDecoder {
    fn send_packet(&mut self, packet: &Packet) -> EngineResult<usize> {
        if packet.data.len() < 5 {
            return Err(EngineError::InvalidData("short audio packet".to_string()));
        }
        let samples = le_u32(&packet.data, 0) as usize;
        let fill = packet.data[4];

        let format = self.params.sample_format;
        let channels = self.params.channels as usize;
        let width = format.bytes_per_sample();
        let planes = if format.is_planar() {
            (0..channels)
                .map(|ch| Bytes::from(vec![fill.wrapping_add(ch as u8); samples * width]))
                .collect()
        } else {
            vec![Bytes::from(vec![fill; samples * width * channels])]
        };

        self.frames.push_back(AudioFrame {
            format,
            channels: self.params.channels,
            sample_count: samples,
            planes,
            pts: packet.pts,
        });
        Ok(packet.data.len())
    }

    fn receive_frame(&mut self) -> EngineResult<Receive> {
        Ok(self
            .frames
            .pop_front()
            .map(|frame| Receive::Frame(DecodedFrame::Audio(frame)))
            .unwrap_or(Receive::NeedInput))
    }

    fn flush(&mut self) {
        self.frames.clear();
    }
}
