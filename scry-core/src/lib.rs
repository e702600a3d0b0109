//! # scry-core
//!
//! Core protocol library for the scry remote screen sharing system.
//!
//! This crate contains:
//! - **Protocol types**: `ControlFrame`, `ControlMessage`, `Command`, typed payloads
//! - **Codec**: `ControlCodec` for length-prefixed JSON over TCP via `tokio_util`
//! - **Datagram**: discriminator-prefixed classification for the frame/registration path
//! - **Channel**: `ControlChannel` for managed control connections
//! - **Session**: the broker's session record and its phase state machine
//! - **Stream**: motion gate, adaptive quality, transmit/receive loops, codec seams
//! - **Error**: `ScryError` — typed, `thiserror`-based error hierarchy

pub mod channel;
pub mod codec;
pub mod datagram;
pub mod error;
pub mod message;
pub mod session;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use channel::{ControlChannel, ControlSender};
pub use codec::{ControlCodec, MAX_CONTROL_FRAME};
pub use datagram::{ControlDatagram, Datagram, MAX_DATAGRAM, MIN_FRAME_LEN};
pub use error::ScryError;
pub use message::{
    AuthResponse, AuthStatus, Command, ControlFrame, ControlMessage, Hello, KeyPress, MouseButton,
    MouseClick, MouseMove, PeerInfo, Role, StreamerPeerInfo,
};
pub use session::{Credentials, PeerExchange, Session, SessionPhase};

// ── Stream re-exports ────────────────────────────────────────────
pub use stream::{
    FrameDecoder, FrameEncoder, FrameReceiver, FrameSource, FrameStats, InputInjector, MotionGate,
    MotionGateConfig, QualityConfig, QualityController, RawFrame, StreamTransmitter,
    SyntheticSource, TransmitterConfig, ZstdFrameCodec,
};
