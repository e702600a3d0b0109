//! Frame encode/decode seam, with a zstd-backed implementation.
//!
//! The streamer encodes at an adaptively chosen quality and the
//! controller decodes whatever arrives. A platform image codec (JPEG,
//! etc.) plugs in behind the same pair of traits; [`ZstdFrameCodec`]
//! is the in-tree implementation.
//!
//! ## Wire format
//!
//! ```text
//! width:   u32  (4, little-endian)
//! height:  u32  (4)
//! format:  u8   (1)  0 = Rgb8, 1 = Luma8
//! data:    [u8]      zstd-compressed pixel buffer
//! ```

use crate::error::ScryError;
use crate::stream::types::{PixelFormat, RawFrame};

/// Encoded-frame header size on the wire.
const HEADER_SIZE: usize = 9;

// ── Traits ───────────────────────────────────────────────────────

/// Compresses a raw frame for transmission.
pub trait FrameEncoder: Send {
    /// Encode at the given quality (0–100; higher spends more effort).
    fn encode(&mut self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, ScryError>;
}

/// Reconstructs a raw frame from encoded bytes.
pub trait FrameDecoder: Send {
    fn decode(&mut self, bytes: &[u8]) -> Result<RawFrame, ScryError>;
}

// ── ZstdFrameCodec ───────────────────────────────────────────────

/// Quality-mapped zstd codec.
///
/// Quality maps onto the compression level, so lowering quality makes
/// each frame cheaper to produce — which is what the adaptive
/// controller relies on when the pipeline falls behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZstdFrameCodec;

impl ZstdFrameCodec {
    pub fn new() -> Self {
        Self
    }

    fn level_for_quality(quality: u8) -> i32 {
        (quality as i32 / 10).clamp(1, 10)
    }
}

impl FrameEncoder for ZstdFrameCodec {
    fn encode(&mut self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, ScryError> {
        let level = Self::level_for_quality(quality);
        let compressed = zstd::encode_all(frame.data.as_slice(), level)
            .map_err(|e| ScryError::Encode(format!("zstd encode failed: {e}")))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
        out.extend_from_slice(&frame.width.to_le_bytes());
        out.extend_from_slice(&frame.height.to_le_bytes());
        out.push(match frame.format {
            PixelFormat::Rgb8 => 0,
            PixelFormat::Luma8 => 1,
        });
        out.extend_from_slice(&compressed);
        Ok(out)
    }
}

impl FrameDecoder for ZstdFrameCodec {
    fn decode(&mut self, bytes: &[u8]) -> Result<RawFrame, ScryError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ScryError::Decode(format!(
                "encoded frame too short: {} bytes",
                bytes.len()
            )));
        }

        let width = u32::from_le_bytes(bytes[0..4].try_into().expect("4 bytes"));
        let height = u32::from_le_bytes(bytes[4..8].try_into().expect("4 bytes"));
        let format = match bytes[8] {
            0 => PixelFormat::Rgb8,
            1 => PixelFormat::Luma8,
            other => {
                return Err(ScryError::Decode(format!("unknown pixel format {other}")));
            }
        };

        let data = zstd::decode_all(&bytes[HEADER_SIZE..])
            .map_err(|e| ScryError::Decode(format!("zstd decode failed: {e}")))?;

        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(ScryError::Decode(format!(
                "decoded {} bytes for a {width}x{height} frame, expected {expected}",
                data.len()
            )));
        }

        RawFrame::new(width, height, format, data).map_err(|e| ScryError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datagram::{MAX_DATAGRAM, MIN_FRAME_LEN};
    use crate::stream::source::{FrameSource, SyntheticSource};

    #[test]
    fn roundtrip_preserves_pixels() {
        let mut codec = ZstdFrameCodec::new();
        let frame = SyntheticSource::new(320, 240).capture().unwrap();

        let encoded = codec.encode(&frame, 70).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert_eq!(decoded.width, 320);
        assert_eq!(decoded.height, 240);
        assert_eq!(decoded.format, PixelFormat::Rgb8);
        assert_eq!(decoded.data, frame.data);
    }

    #[test]
    fn canonical_frame_fits_one_datagram() {
        let mut codec = ZstdFrameCodec::new();
        let frame = SyntheticSource::new(800, 600).capture().unwrap();

        for quality in [50u8, 70, 85] {
            let encoded = codec.encode(&frame, quality).unwrap();
            assert!(encoded.len() > MIN_FRAME_LEN, "q{quality}: {}", encoded.len());
            assert!(encoded.len() < MAX_DATAGRAM, "q{quality}: {}", encoded.len());
        }
    }

    #[test]
    fn quality_maps_to_level() {
        assert_eq!(ZstdFrameCodec::level_for_quality(0), 1);
        assert_eq!(ZstdFrameCodec::level_for_quality(50), 5);
        assert_eq!(ZstdFrameCodec::level_for_quality(85), 8);
        assert_eq!(ZstdFrameCodec::level_for_quality(100), 10);
    }

    #[test]
    fn truncated_input_is_decode_error() {
        let mut codec = ZstdFrameCodec::new();
        assert!(codec.decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn corrupt_body_is_decode_error() {
        let mut codec = ZstdFrameCodec::new();
        let frame = SyntheticSource::new(64, 64).capture().unwrap();
        let mut encoded = codec.encode(&frame, 70).unwrap();
        let len = encoded.len();
        encoded.truncate(len / 2);
        assert!(codec.decode(&encoded).is_err());
    }

    #[test]
    fn dimension_mismatch_is_decode_error() {
        let mut codec = ZstdFrameCodec::new();
        let frame = SyntheticSource::new(64, 64).capture().unwrap();
        let mut encoded = codec.encode(&frame, 70).unwrap();
        // Lie about the width.
        encoded[0..4].copy_from_slice(&128u32.to_le_bytes());
        assert!(codec.decode(&encoded).is_err());
    }
}
