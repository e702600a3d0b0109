//! Domain-specific error types for the scry protocol.
//!
//! All fallible operations return `Result<T, ScryError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the scry protocol.
#[derive(Debug, Error)]
pub enum ScryError {
    // ── Authentication Errors ────────────────────────────────────
    /// Credentials were absent or did not match the streamer's pair.
    ///
    /// Terminates the offending connection; other participants are
    /// unaffected.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    // ── Protocol Errors ──────────────────────────────────────────
    /// A message violated protocol rules.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// A JSON payload could not be parsed or produced.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A control frame exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A datagram exceeded the UDP payload limit.
    #[error("datagram too large: {size} bytes (max {max})")]
    DatagramTooLarge { size: usize, max: usize },

    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/UDP layer reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// An mpsc/watch channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Pipeline Errors ──────────────────────────────────────────
    /// The frame source failed to produce a frame.
    #[error("capture error: {0}")]
    Capture(String),

    /// Encoding a frame for transmission failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Decoding a received frame failed.
    #[error("decode error: {0}")]
    Decode(String),

    // ── Application Errors ───────────────────────────────────────
    /// A command string could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for ScryError {
    fn from(s: String) -> Self {
        ScryError::Other(s)
    }
}

impl From<&str> for ScryError {
    fn from(s: &str) -> Self {
        ScryError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ScryError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ScryError::ChannelClosed
    }
}

impl ScryError {
    /// Shorthand for an [`ScryError::Auth`] with a formatted reason.
    pub fn auth(reason: impl Into<String>) -> Self {
        ScryError::Auth {
            reason: reason.into(),
        }
    }
}
