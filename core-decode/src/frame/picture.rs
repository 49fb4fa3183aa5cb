//! Packing of decoded pictures into the video output buffer.

use crate::engine::VideoFrame;
use crate::error::{DecodeError, Result};
use crate::format::PixelFormat;

/// Fixed-size buffer holding tightly packed YUV 4:2:0 pictures.
///
/// Sized once when a session opens and never resized.
#[derive(Debug)]
pub struct PictureBuffer {
    data: Vec<u8>,
    frame_size: usize,
}

impl PictureBuffer {
    /// Allocates room for `frames` pictures of `frame_size` bytes.
    pub fn new(frame_size: usize, frames: usize) -> Self {
        Self {
            data: vec![0u8; frame_size * frames],
            frame_size,
        }
    }

    /// Size of one picture in the stream's native format.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Copies the planes of `frame` row by row, dropping stride padding.
    ///
    /// The result is the full-resolution luma plane followed by the two
    /// chroma planes, each `ceil(w/2) x ceil(h/2)`.
    pub fn pack_yuv420p(&mut self, frame: &VideoFrame) -> Result<&[u8]> {
        if frame.format != PixelFormat::Yuv420p {
            return Err(DecodeError::InvalidFormat(format!(
                "cannot pack {:?} pictures, only Yuv420p is supported",
                frame.format
            )));
        }

        let width = frame.width as usize;
        let height = frame.height as usize;
        let size = PixelFormat::Yuv420p.frame_size(frame.width, frame.height);
        if size > self.data.len() {
            return Err(DecodeError::InvalidData(format!(
                "{}x{} picture does not fit the {} byte output buffer",
                width,
                height,
                self.data.len()
            )));
        }
        if frame.planes.len() < 3 {
            return Err(DecodeError::InvalidData(format!(
                "expected 3 planes, got {}",
                frame.planes.len()
            )));
        }

        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);
        let layout = [
            (width, height),
            (chroma_width, chroma_height),
            (chroma_width, chroma_height),
        ];

        let mut offset = 0;
        for (index, (plane, (plane_width, plane_height))) in
            frame.planes.iter().zip(layout).enumerate()
        {
            if plane_height == 0 || plane_width == 0 {
                continue;
            }
            let needed = plane.stride * (plane_height - 1) + plane_width;
            if plane.stride < plane_width || plane.data.len() < needed {
                return Err(DecodeError::InvalidData(format!(
                    "plane {} too small for {}x{} picture",
                    index, width, height
                )));
            }

            for row in plane.data.chunks(plane.stride).take(plane_height) {
                self.data[offset..offset + plane_width].copy_from_slice(&row[..plane_width]);
                offset += plane_width;
            }
        }

        Ok(&self.data[..size])
    }
}
