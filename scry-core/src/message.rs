//! Control-channel message types and command definitions.
//!
//! Everything on the control channel is JSON. Three frame shapes exist:
//! the initial [`Hello`] handshake, the broker's [`AuthResponse`], and
//! the [`ControlMessage`] command envelope used in both directions once
//! a session is established.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ScryError;

// ── Role ─────────────────────────────────────────────────────────

/// Which side of the session a control connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Views the remote screen and issues input commands.
    Controller,
    /// Exposes its screen and executes received input commands.
    Streamer,
}

impl Role {
    /// The opposite role — relay targets resolve through this.
    pub fn peer(self) -> Role {
        match self {
            Role::Controller => Role::Streamer,
            Role::Streamer => Role::Controller,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Controller => write!(f, "controller"),
            Role::Streamer => write!(f, "streamer"),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────

/// All commands understood on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Click at a position on the canonical stream frame.
    MouseClick,
    /// Move the pointer on the canonical stream frame.
    MouseMove,
    /// Press (tap) a named key.
    KeyPress,
    /// Suspend frame transmission; the streamer idles without capturing.
    Pause,
    /// Resume frame transmission.
    Continue,
    /// Latency probe; carries no payload and expects no reply.
    Ping,
    /// Advisory notice that the sender is going away.
    Disconnect,
    /// Broker → client: the other side's datagram endpoint.
    PeerInfo,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Command payloads ─────────────────────────────────────────────

/// Mouse button on a click command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
}

/// Payload of [`Command::MouseClick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseClick {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
}

/// Payload of [`Command::MouseMove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMove {
    pub x: i32,
    pub y: i32,
}

/// Payload of [`Command::KeyPress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
}

/// Payload of [`Command::PeerInfo`].
///
/// Carries the peer's observed datagram endpoint. `peer_port` is the
/// port the peer actually registered from, not an assumed well-known
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_ip: String,
    pub peer_port: u16,
}

// ── ControlMessage ───────────────────────────────────────────────

/// The command envelope exchanged once a session is established.
///
/// Sent without acknowledgment or sequence numbers; ordering within a
/// connection comes from the underlying stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub command: Command,
    #[serde(default)]
    pub payload: Value,
    pub timestamp: f64,
}

impl ControlMessage {
    /// Build an envelope with the current wall-clock timestamp.
    pub fn new(command: Command, payload: Value) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            command,
            payload,
            timestamp,
        }
    }

    pub fn mouse_click(x: i32, y: i32, button: MouseButton) -> Self {
        let payload = serde_json::to_value(MouseClick { x, y, button }).expect("payload is json");
        Self::new(Command::MouseClick, payload)
    }

    pub fn mouse_move(x: i32, y: i32) -> Self {
        let payload = serde_json::to_value(MouseMove { x, y }).expect("payload is json");
        Self::new(Command::MouseMove, payload)
    }

    pub fn key_press(key: impl Into<String>) -> Self {
        let payload = serde_json::to_value(KeyPress { key: key.into() }).expect("payload is json");
        Self::new(Command::KeyPress, payload)
    }

    pub fn pause() -> Self {
        Self::new(Command::Pause, Value::Object(Default::default()))
    }

    pub fn resume() -> Self {
        Self::new(Command::Continue, Value::Object(Default::default()))
    }

    pub fn ping() -> Self {
        Self::new(Command::Ping, Value::Object(Default::default()))
    }

    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect, Value::Object(Default::default()))
    }

    pub fn peer_info(peer_ip: impl Into<String>, peer_port: u16) -> Self {
        let payload = serde_json::to_value(PeerInfo {
            peer_ip: peer_ip.into(),
            peer_port,
        })
        .expect("payload is json");
        Self::new(Command::PeerInfo, payload)
    }

    /// Deserialize the payload into its typed form.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ScryError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

// ── Handshake & auth ─────────────────────────────────────────────

/// First frame a client sends on its control connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    #[serde(rename = "type")]
    pub role: Role,
    pub session_id: String,
    pub password: String,
}

/// Outcome of a controller's authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Success,
    Error,
}

/// The streamer's connection info handed to a freshly authenticated
/// controller, for a possible P2P attempt.
///
/// `udp_addr` may be absent when the streamer has not yet sent any
/// datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerPeerInfo {
    pub ip: String,
    pub udp_addr: Option<String>,
    pub connected: bool,
}

/// Broker → controller reply to the [`Hello`] handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: AuthStatus,
    pub message: String,
    pub peer_info: Option<StreamerPeerInfo>,
}

impl AuthResponse {
    pub fn success(peer_info: Option<StreamerPeerInfo>) -> Self {
        Self {
            status: AuthStatus::Success,
            message: "Authentication successful".to_string(),
            peer_info,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Error,
            message: message.into(),
            peer_info: None,
        }
    }
}

// ── ControlFrame ─────────────────────────────────────────────────

/// Any complete JSON object that may appear on the control channel.
///
/// The variants have disjoint required keys (`type` / `status` /
/// `command`), so untagged deserialization is unambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlFrame {
    Hello(Hello),
    Auth(AuthResponse),
    Command(ControlMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_names() {
        let json = serde_json::to_string(&Command::MouseClick).unwrap();
        assert_eq!(json, "\"MOUSE_CLICK\"");
        let json = serde_json::to_string(&Command::PeerInfo).unwrap();
        assert_eq!(json, "\"PEER_INFO\"");

        let cmd: Command = serde_json::from_str("\"KEY_PRESS\"").unwrap();
        assert_eq!(cmd, Command::KeyPress);
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(serde_json::from_str::<Command>("\"SELF_DESTRUCT\"").is_err());
    }

    #[test]
    fn envelope_shape() {
        let msg = ControlMessage::mouse_click(400, 300, MouseButton::Left);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["command"], "MOUSE_CLICK");
        assert_eq!(value["payload"]["x"], 400);
        assert_eq!(value["payload"]["y"], 300);
        assert_eq!(value["payload"]["button"], "left");
        assert!(value["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn payload_roundtrip() {
        let msg = ControlMessage::peer_info("192.168.1.50", 48231);
        let info: PeerInfo = msg.payload_as().unwrap();
        assert_eq!(info.peer_ip, "192.168.1.50");
        assert_eq!(info.peer_port, 48231);
    }

    #[test]
    fn payload_type_mismatch_is_error() {
        let msg = ControlMessage::key_press("enter");
        assert!(msg.payload_as::<MouseClick>().is_err());
    }

    #[test]
    fn hello_wire_shape() {
        let hello = Hello {
            role: Role::Streamer,
            session_id: "123456789".into(),
            password: "Ab3dE9".into(),
        };
        let value = serde_json::to_value(&hello).unwrap();
        assert_eq!(value["type"], "streamer");
        assert_eq!(value["session_id"], "123456789");
    }

    #[test]
    fn control_frame_untagged_dispatch() {
        let hello = r#"{"type":"controller","session_id":"1","password":"x"}"#;
        assert!(matches!(
            serde_json::from_str::<ControlFrame>(hello).unwrap(),
            ControlFrame::Hello(_)
        ));

        let auth = r#"{"status":"error","message":"Invalid Session ID or Password","peer_info":null}"#;
        assert!(matches!(
            serde_json::from_str::<ControlFrame>(auth).unwrap(),
            ControlFrame::Auth(_)
        ));

        let cmd = r#"{"command":"PAUSE","payload":{},"timestamp":1700000000.5}"#;
        assert!(matches!(
            serde_json::from_str::<ControlFrame>(cmd).unwrap(),
            ControlFrame::Command(_)
        ));
    }

    #[test]
    fn role_peer() {
        assert_eq!(Role::Controller.peer(), Role::Streamer);
        assert_eq!(Role::Streamer.peer(), Role::Controller);
    }
}
