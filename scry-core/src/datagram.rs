//! Datagram classification for the frame/registration path.
//!
//! Every datagram carries a one-byte discriminator so the relay never
//! has to guess whether bytes are a control object or frame data:
//!
//! ```text
//! 0x01  control — remainder is a small JSON object
//! 0x02  frame   — remainder is encoded frame bytes
//! ```
//!
//! Frames below [`MIN_FRAME_LEN`] are rejected as implausible; frame
//! payloads are otherwise opaque here, even ones that happen to look
//! like JSON.

use serde::{Deserialize, Serialize};

use crate::error::ScryError;

/// Discriminator byte for a control datagram.
pub const CONTROL_DISCRIMINATOR: u8 = 0x01;
/// Discriminator byte for a frame datagram.
pub const FRAME_DISCRIMINATOR: u8 = 0x02;

/// Smallest plausible encoded frame, in bytes (payload only, without
/// the discriminator).
pub const MIN_FRAME_LEN: usize = 1000;

/// Largest UDP payload we will ever build (IPv4 65_535 − 20 − 8).
pub const MAX_DATAGRAM: usize = 65_507;

// ── ControlDatagram ──────────────────────────────────────────────

/// Small JSON control objects carried on the datagram path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlDatagram {
    /// Controller → broker: "my frame endpoint is this port".
    ControllerUdp { port: u16 },
    /// Controller → broker: "I am receiving directly from the
    /// streamer; relay is no longer needed".
    P2pActive,
}

// ── Datagram ─────────────────────────────────────────────────────

/// A classified datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Control(ControlDatagram),
    Frame(Vec<u8>),
}

impl Datagram {
    /// Serialize with the discriminator prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ScryError> {
        let mut out;
        match self {
            Datagram::Control(ctl) => {
                let body = serde_json::to_vec(ctl)?;
                out = Vec::with_capacity(1 + body.len());
                out.push(CONTROL_DISCRIMINATOR);
                out.extend_from_slice(&body);
            }
            Datagram::Frame(payload) => {
                out = Vec::with_capacity(1 + payload.len());
                out.push(FRAME_DISCRIMINATOR);
                out.extend_from_slice(payload);
            }
        }
        if out.len() > MAX_DATAGRAM {
            return Err(ScryError::DatagramTooLarge {
                size: out.len(),
                max: MAX_DATAGRAM,
            });
        }
        Ok(out)
    }

    /// Classify a received datagram.
    ///
    /// Each datagram is independent; a classification failure drops
    /// only that datagram.
    pub fn classify(buf: &[u8]) -> Result<Datagram, ScryError> {
        let (&discriminator, body) = buf
            .split_first()
            .ok_or(ScryError::Protocol("empty datagram"))?;

        match discriminator {
            CONTROL_DISCRIMINATOR => {
                let ctl: ControlDatagram = serde_json::from_slice(body)?;
                Ok(Datagram::Control(ctl))
            }
            FRAME_DISCRIMINATOR => {
                if body.len() < MIN_FRAME_LEN {
                    return Err(ScryError::Protocol("frame datagram below minimum size"));
                }
                Ok(Datagram::Frame(body.to_vec()))
            }
            _ => Err(ScryError::Protocol("unknown datagram discriminator")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_roundtrip() {
        let dg = Datagram::Control(ControlDatagram::ControllerUdp { port: 48231 });
        let bytes = dg.encode().unwrap();
        assert_eq!(bytes[0], CONTROL_DISCRIMINATOR);

        let back = Datagram::classify(&bytes).unwrap();
        assert_eq!(back, dg);
    }

    #[test]
    fn control_wire_shape() {
        let bytes = Datagram::Control(ControlDatagram::P2pActive)
            .encode()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(json["type"], "p2p_active");

        let bytes = Datagram::Control(ControlDatagram::ControllerUdp { port: 7 })
            .encode()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(json["type"], "controller_udp");
        assert_eq!(json["port"], 7);
    }

    #[test]
    fn frame_roundtrip() {
        let payload = vec![0xAB; 4096];
        let bytes = Datagram::Frame(payload.clone()).encode().unwrap();
        assert_eq!(bytes[0], FRAME_DISCRIMINATOR);
        assert_eq!(bytes.len(), payload.len() + 1);

        match Datagram::classify(&bytes).unwrap() {
            Datagram::Frame(p) => assert_eq!(p, payload),
            other => panic!("wrong classification: {other:?}"),
        }
    }

    #[test]
    fn undersized_frame_rejected() {
        let mut bytes = vec![FRAME_DISCRIMINATOR];
        bytes.extend_from_slice(&[0u8; MIN_FRAME_LEN - 1]);
        assert!(Datagram::classify(&bytes).is_err());
    }

    #[test]
    fn json_looking_frame_stays_a_frame() {
        // A frame payload that parses as JSON must never be demoted to
        // a control datagram — the discriminator decides, not content.
        let mut payload = b"{\"type\":\"p2p_active\"".to_vec();
        payload.resize(MIN_FRAME_LEN + 64, b' ');
        payload.push(b'}');

        let mut bytes = vec![FRAME_DISCRIMINATOR];
        bytes.extend_from_slice(&payload);
        assert!(matches!(
            Datagram::classify(&bytes).unwrap(),
            Datagram::Frame(_)
        ));
    }

    #[test]
    fn unknown_discriminator_rejected() {
        let bytes = vec![0x7F; 2000];
        assert!(Datagram::classify(&bytes).is_err());
    }

    #[test]
    fn empty_datagram_rejected() {
        assert!(Datagram::classify(&[]).is_err());
    }

    #[test]
    fn oversized_encode_rejected() {
        let dg = Datagram::Frame(vec![0u8; MAX_DATAGRAM]);
        assert!(matches!(
            dg.encode(),
            Err(ScryError::DatagramTooLarge { .. })
        ));
    }
}
