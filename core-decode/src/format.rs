//! # Media Formats
//!
//! Pixel and sample formats exchanged with the decode engine.
//!
//! Both enums use the integer numbering common to decode engines, so the
//! codes reported to the host can be interpreted without a translation table.

use serde::{Deserialize, Serialize};

/// Picture layouts a decode engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, the only layout the output path packs.
    Yuv420p = 0,
    Yuyv422 = 1,
    Rgb24 = 2,
    Bgr24 = 3,
    Yuv422p = 4,
    Yuv444p = 5,
    Yuv410p = 6,
    Yuv411p = 7,
    Gray8 = 8,
    MonoWhite = 9,
    MonoBlack = 10,
    Pal8 = 11,
    Yuvj420p = 12,
    Yuvj422p = 13,
    Yuvj444p = 14,
    Uyvy422 = 15,
    Nv12 = 23,
    Nv21 = 24,
    Argb = 25,
    Rgba = 26,
    Abgr = 27,
    Bgra = 28,
}

impl PixelFormat {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        use PixelFormat::*;
        let format = match code {
            0 => Yuv420p,
            1 => Yuyv422,
            2 => Rgb24,
            3 => Bgr24,
            4 => Yuv422p,
            5 => Yuv444p,
            6 => Yuv410p,
            7 => Yuv411p,
            8 => Gray8,
            9 => MonoWhite,
            10 => MonoBlack,
            11 => Pal8,
            12 => Yuvj420p,
            13 => Yuvj422p,
            14 => Yuvj444p,
            15 => Uyvy422,
            23 => Nv12,
            24 => Nv21,
            25 => Argb,
            26 => Rgba,
            27 => Abgr,
            28 => Bgra,
            _ => return None,
        };
        Some(format)
    }

    /// Bytes needed to hold one tightly packed picture of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        use PixelFormat::*;
        let w = width as usize;
        let h = height as usize;
        let luma = w * h;
        match self {
            Yuv420p | Yuvj420p | Nv12 | Nv21 => luma + 2 * w.div_ceil(2) * h.div_ceil(2),
            Yuv422p | Yuvj422p => luma + 2 * w.div_ceil(2) * h,
            Yuv444p | Yuvj444p | Rgb24 | Bgr24 => 3 * luma,
            Yuv410p => luma + 2 * w.div_ceil(4) * h.div_ceil(4),
            Yuv411p => luma + 2 * w.div_ceil(4) * h,
            Yuyv422 | Uyvy422 => 4 * w.div_ceil(2) * h,
            Gray8 | Pal8 => luma,
            MonoWhite | MonoBlack => w.div_ceil(8) * h,
            Argb | Rgba | Abgr | Bgra => 4 * luma,
        }
    }
}

/// Audio sample encodings. `*Planar` variants store one plane per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SampleFormat {
    U8 = 0,
    S16 = 1,
    S32 = 2,
    F32 = 3,
    F64 = 4,
    U8Planar = 5,
    S16Planar = 6,
    S32Planar = 7,
    F32Planar = 8,
    F64Planar = 9,
    S64 = 10,
    S64Planar = 11,
}

impl SampleFormat {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        use SampleFormat::*;
        let format = match code {
            0 => U8,
            1 => S16,
            2 => S32,
            3 => F32,
            4 => F64,
            5 => U8Planar,
            6 => S16Planar,
            7 => S32Planar,
            8 => F32Planar,
            9 => F64Planar,
            10 => S64,
            11 => S64Planar,
            _ => return None,
        };
        Some(format)
    }

    pub fn bytes_per_sample(self) -> usize {
        use SampleFormat::*;
        match self {
            U8 | U8Planar => 1,
            S16 | S16Planar => 2,
            S32 | S32Planar | F32 | F32Planar => 4,
            F64 | F64Planar | S64 | S64Planar => 8,
        }
    }

    pub fn is_planar(self) -> bool {
        use SampleFormat::*;
        matches!(
            self,
            U8Planar | S16Planar | S32Planar | F32Planar | F64Planar | S64Planar
        )
    }

    /// The interleaved counterpart of this format.
    ///
    /// Audio reaches the host interleaved, so this is the format reported
    /// when a session opens.
    pub fn packed(self) -> Self {
        use SampleFormat::*;
        match self {
            U8Planar => U8,
            S16Planar => S16,
            S32Planar => S32,
            F32Planar => F32,
            F64Planar => F64,
            S64Planar => S64,
            other => other,
        }
    }
}

/// A rational number, used for stream time bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value as a float; a zero denominator yields `0.0`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}
