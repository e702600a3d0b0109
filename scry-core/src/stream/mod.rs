//! Adaptive streaming pipeline: capture seam, motion gating, quality
//! control, encode/decode, and the transmit/receive loops.

pub mod encoder;
pub mod geometry;
pub mod input;
pub mod motion;
pub mod quality;
pub mod receiver;
pub mod source;
pub mod transmitter;
pub mod types;

pub use encoder::{FrameDecoder, FrameEncoder, ZstdFrameCodec};
pub use input::{InputEvent, InputInjector, LogInjector, RecordingInjector};
pub use motion::{GateDecision, MotionGate, MotionGateConfig};
pub use quality::{QualityChange, QualityConfig, QualityController};
pub use receiver::{FrameReceiver, FrameStats};
pub use source::{FrameSource, SyntheticSource};
pub use transmitter::{StreamTransmitter, TransmitterConfig};
pub use types::{PixelFormat, RawFrame};
