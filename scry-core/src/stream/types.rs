//! Shared types for the capture/encode/display pipeline.
//!
//! These are internal frame representations passed between pipeline
//! stages; the wire form is whatever the frame codec produces.

use std::time::Instant;

use crate::error::ScryError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw frames. Rows are tightly packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// 1 byte per pixel: grayscale intensity.
    Luma8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed frame, `width * height * bpp` bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Tightly packed pixel data.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Construct a frame, validating the buffer length.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, ScryError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(ScryError::Capture(format!(
                "frame buffer is {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            timestamp: Instant::now(),
        })
    }

    /// Total byte size of the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// The pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Nearest-neighbour resample to `width × height`.
    ///
    /// Returns a clone when the dimensions already match.
    pub fn downsample(&self, width: u32, height: u32) -> RawFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }

        let bpp = self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(width as usize * height as usize * bpp);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                data.extend_from_slice(self.pixel(src_x, src_y));
            }
        }

        RawFrame {
            width,
            height,
            format: self.format,
            data,
            timestamp: self.timestamp,
        }
    }

    /// Convert to a grayscale intensity frame (ITU-R BT.601 weights).
    pub fn to_luma(&self) -> RawFrame {
        match self.format {
            PixelFormat::Luma8 => self.clone(),
            PixelFormat::Rgb8 => {
                let data = self
                    .data
                    .chunks_exact(3)
                    .map(|px| {
                        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                        ((r * 299 + g * 587 + b * 114) / 1000) as u8
                    })
                    .collect();
                RawFrame {
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::Luma8,
                    data,
                    timestamp: self.timestamp,
                }
            }
        }
    }
}
