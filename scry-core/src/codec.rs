//! Length-prefixed JSON codec for the control channel.
//!
//! Each logical message is one complete JSON object, preceded by a
//! `u32` little-endian byte length. Explicit framing means a command
//! survives TCP fragmentation instead of relying on one-object-per-read.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ScryError;
use crate::message::ControlFrame;

/// Upper bound for a single control frame. Commands are tiny; anything
/// near this limit is malformed or hostile.
pub const MAX_CONTROL_FRAME: usize = 64 * 1024;

const LEN_PREFIX: usize = 4;

/// Codec for [`ControlFrame`]s over a TCP stream.
#[derive(Debug, Default)]
pub struct ControlCodec;

impl Decoder for ControlCodec {
    type Item = ControlFrame;
    type Error = ScryError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }

        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&src[..LEN_PREFIX]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > MAX_CONTROL_FRAME {
            return Err(ScryError::FrameTooLarge {
                size: len,
                max: MAX_CONTROL_FRAME,
            });
        }
        if src.len() < LEN_PREFIX + len {
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX);
        let body = src.split_to(len);
        let frame: ControlFrame = serde_json::from_slice(&body)?;
        Ok(Some(frame))
    }
}

impl Encoder<ControlFrame> for ControlCodec {
    type Error = ScryError;

    fn encode(&mut self, item: ControlFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        if body.len() > MAX_CONTROL_FRAME {
            return Err(ScryError::FrameTooLarge {
                size: body.len(),
                max: MAX_CONTROL_FRAME,
            });
        }
        dst.reserve(LEN_PREFIX + body.len());
        dst.put_u32_le(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ControlMessage, Hello, MouseButton, Role};

    fn encode_frame(frame: ControlFrame) -> BytesMut {
        let mut buf = BytesMut::new();
        ControlCodec.encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn roundtrip_hello() {
        let mut buf = encode_frame(ControlFrame::Hello(Hello {
            role: Role::Controller,
            session_id: "123456789".into(),
            password: "Ab3dE9".into(),
        }));

        let frame = ControlCodec.decode(&mut buf).unwrap().unwrap();
        match frame {
            ControlFrame::Hello(h) => {
                assert_eq!(h.role, Role::Controller);
                assert_eq!(h.session_id, "123456789");
            }
            other => panic!("wrong variant: {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_read_returns_none() {
        let full = encode_frame(ControlFrame::Command(ControlMessage::ping()));

        // Feed one byte at a time; only the final byte yields a frame.
        let mut buf = BytesMut::new();
        for (i, byte) in full.iter().enumerate() {
            buf.put_u8(*byte);
            let result = ControlCodec.decode(&mut buf).unwrap();
            if i + 1 < full.len() {
                assert!(result.is_none(), "decoded early at byte {i}");
            } else {
                assert!(result.is_some());
            }
        }
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let mut buf = encode_frame(ControlFrame::Command(ControlMessage::pause()));
        buf.extend_from_slice(&encode_frame(ControlFrame::Command(
            ControlMessage::mouse_click(10, 20, MouseButton::Right),
        )));

        let first = ControlCodec.decode(&mut buf).unwrap().unwrap();
        let second = ControlCodec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(first, ControlFrame::Command(ref m) if m.command == crate::message::Command::Pause));
        assert!(
            matches!(second, ControlFrame::Command(ref m) if m.command == crate::message::Command::MouseClick)
        );
        assert!(ControlCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32_le((MAX_CONTROL_FRAME + 1) as u32);
        buf.put_slice(b"xxxx");
        assert!(matches!(
            ControlCodec.decode(&mut buf),
            Err(ScryError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn malformed_json_is_error() {
        let body = b"{not json";
        let mut buf = BytesMut::new();
        buf.put_u32_le(body.len() as u32);
        buf.put_slice(body);
        assert!(matches!(
            ControlCodec.decode(&mut buf),
            Err(ScryError::Json(_))
        ));
    }
}
