//! scry streamer library.
//!
//! The binary in `main.rs` is a thin CLI wrapper around
//! [`streamer::Streamer`].

pub mod config;
pub mod streamer;

pub use config::StreamerConfig;
pub use streamer::Streamer;
