//! Controller service: authentication, command sending, and click
//! translation.
//!
//! [`Controller::connect`] performs the handshake, wires the frame
//! receiver, and spawns a task that watches the control channel for
//! broker notifications (`PEER_INFO`). Commands go out through a
//! cloned control sender; click coordinates are translated from the
//! viewport through the letterbox into stream space before sending.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use scry_core::message::{
    AuthStatus, Command, ControlFrame, ControlMessage, Hello, MouseButton, PeerInfo, Role,
};
use scry_core::stream::geometry::viewport_to_stream;
use scry_core::stream::{FrameReceiver, FrameStats, ZstdFrameCodec};
use scry_core::{ControlChannel, ControlSender, ScryError};

use crate::config::ControllerConfig;

// ── Controller ───────────────────────────────────────────────────

/// An authenticated controller session.
pub struct Controller {
    sender: ControlSender,
    stats_rx: watch::Receiver<FrameStats>,
    canvas: (u32, u32),
}

impl Controller {
    /// Connect, authenticate, and wire up the frame receiver.
    ///
    /// Fails with [`ScryError::Auth`] on a structured rejection and
    /// [`ScryError::Transport`] when the broker is unreachable. On
    /// success the caller owns the [`FrameReceiver`] and is expected
    /// to spawn its `run` loop.
    pub async fn connect(
        config: &ControllerConfig,
        session_id: &str,
        password: &str,
    ) -> Result<(Self, FrameReceiver<ZstdFrameCodec>), ScryError> {
        let control_addr = format!(
            "{}:{}",
            config.network.broker_addr, config.network.tcp_port
        );
        let mut channel = ControlChannel::connect(&control_addr).await?;
        channel
            .send(ControlFrame::Hello(Hello {
                role: Role::Controller,
                session_id: session_id.into(),
                password: password.into(),
            }))
            .await?;

        let response = match channel.recv().await {
            Some(ControlFrame::Auth(response)) => response,
            Some(other) => {
                debug!("got {other:?} instead of an auth response");
                return Err(ScryError::Protocol("expected an auth response"));
            }
            None => return Err(ScryError::ChannelClosed),
        };
        if response.status != AuthStatus::Success {
            return Err(ScryError::auth(response.message));
        }
        info!("authenticated with broker at {control_addr}");

        // The streamer's IP, when already known, seeds P2P detection.
        let initial_peer = response
            .peer_info
            .as_ref()
            .and_then(|info| info.ip.parse::<IpAddr>().ok());
        if let Some(ip) = initial_peer {
            info!("streamer address learned from auth response: {ip}");
        }
        let (peer_tx, peer_rx) = watch::channel(initial_peer);
        let peer_tx = Arc::new(peer_tx);

        // Bind the ephemeral datagram endpoint the broker will target.
        let broker_udp = lookup_host((config.network.broker_addr.as_str(), config.network.udp_port))
            .await?
            .next()
            .ok_or_else(|| {
                ScryError::Other(format!(
                    "no address found for {}",
                    config.network.broker_addr
                ))
            })?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let receiver = FrameReceiver::new(socket, broker_udp, ZstdFrameCodec::new(), peer_rx);
        let stats_rx = receiver.stats_receiver();

        let sender = channel.sender();
        tokio::spawn(Self::watch_control(channel, Arc::clone(&peer_tx)));

        Ok((
            Self {
                sender,
                stats_rx,
                canvas: (config.canvas.width, config.canvas.height),
            },
            receiver,
        ))
    }

    /// Background task: absorb broker notifications on the control
    /// channel for the life of the connection.
    async fn watch_control(mut channel: ControlChannel, peer_tx: Arc<watch::Sender<Option<IpAddr>>>) {
        while let Some(frame) = channel.recv().await {
            match frame {
                ControlFrame::Command(message) if message.command == Command::PeerInfo => {
                    match message.payload_as::<PeerInfo>() {
                        Ok(info) => match info.peer_ip.parse::<IpAddr>() {
                            Ok(ip) => {
                                info!("streamer endpoint confirmed: {ip}:{}", info.peer_port);
                                let _ = peer_tx.send(Some(ip));
                            }
                            Err(e) => warn!("unparseable peer ip '{}': {e}", info.peer_ip),
                        },
                        Err(e) => warn!("malformed PEER_INFO dropped: {e}"),
                    }
                }
                other => debug!("ignoring control frame: {other:?}"),
            }
        }
        info!("control connection closed");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Translate a viewport click and send it. Returns `false` when
    /// the click lands in the letterbox bars and is dropped.
    pub async fn mouse_click(
        &self,
        cx: i32,
        cy: i32,
        button: MouseButton,
    ) -> Result<bool, ScryError> {
        match self.translate(cx, cy) {
            Some((x, y)) => {
                self.send(ControlMessage::mouse_click(x, y, button)).await?;
                Ok(true)
            }
            None => {
                debug!("click at ({cx}, {cy}) outside the image area; dropped");
                Ok(false)
            }
        }
    }

    /// Translate a viewport position and send a move. Returns `false`
    /// when the position is outside the image area.
    pub async fn mouse_move(&self, cx: i32, cy: i32) -> Result<bool, ScryError> {
        match self.translate(cx, cy) {
            Some((x, y)) => {
                self.send(ControlMessage::mouse_move(x, y)).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn key_press(&self, key: &str) -> Result<(), ScryError> {
        self.send(ControlMessage::key_press(key)).await
    }

    pub async fn pause(&self) -> Result<(), ScryError> {
        self.send(ControlMessage::pause()).await
    }

    pub async fn resume(&self) -> Result<(), ScryError> {
        self.send(ControlMessage::resume()).await
    }

    /// Send a latency probe and report how long the local send took.
    /// There is no reply on the wire; this measures the control path
    /// up to the socket, as a cheap health signal.
    pub async fn ping(&self) -> Result<Duration, ScryError> {
        let start = Instant::now();
        self.send(ControlMessage::ping()).await?;
        Ok(start.elapsed())
    }

    /// Advisory goodbye; the broker cleans up on connection close
    /// regardless.
    pub async fn disconnect(&self) -> Result<(), ScryError> {
        self.send(ControlMessage::disconnect()).await
    }

    /// Latest receive statistics.
    pub fn stats(&self) -> FrameStats {
        self.stats_rx.borrow().clone()
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn send(&self, message: ControlMessage) -> Result<(), ScryError> {
        self.sender
            .send(ControlFrame::Command(message))
            .await
            .map_err(|_| ScryError::ChannelClosed)
    }

    /// Viewport → stream coordinates via the letterbox mapping, using
    /// the last received frame's geometry (canonical 800×600 until a
    /// frame arrives).
    fn translate(&self, cx: i32, cy: i32) -> Option<(i32, i32)> {
        let stats = self.stats_rx.borrow();
        let (remote_w, remote_h) = if stats.width > 0 && stats.height > 0 {
            (stats.width, stats.height)
        } else {
            (800, 600)
        };
        viewport_to_stream(cx, cy, self.canvas.0, self.canvas.1, remote_w, remote_h)
    }
}

// ── Interactive command parsing ──────────────────────────────────

/// One parsed line of the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Click { x: i32, y: i32, button: MouseButton },
    Move { x: i32, y: i32 },
    Key(String),
    Pause,
    Continue,
    Ping,
    Quit,
}

/// Parse an interactive-mode line.
///
/// ```text
/// click <x> <y> [left|right]
/// move <x> <y>
/// key <name>
/// pause | continue | ping | quit
/// ```
pub fn parse_line(line: &str) -> Result<CliCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (action, args) = parts.split_first().ok_or("empty command")?;

    fn coord(args: &[&str], index: usize, name: &str) -> Result<i32, String> {
        args.get(index)
            .ok_or_else(|| format!("missing <{name}>"))?
            .parse::<i32>()
            .map_err(|_| format!("{name} must be an integer"))
    }

    match *action {
        "click" => {
            let x = coord(args, 0, "x")?;
            let y = coord(args, 1, "y")?;
            let button = match args.get(2) {
                None | Some(&"left") => MouseButton::Left,
                Some(&"right") => MouseButton::Right,
                Some(other) => return Err(format!("unknown button '{other}'")),
            };
            Ok(CliCommand::Click { x, y, button })
        }
        "move" => {
            let x = coord(args, 0, "x")?;
            let y = coord(args, 1, "y")?;
            Ok(CliCommand::Move { x, y })
        }
        "key" => {
            let key = args.first().ok_or("key requires <name>")?;
            Ok(CliCommand::Key(key.to_string()))
        }
        "pause" => Ok(CliCommand::Pause),
        "continue" => Ok(CliCommand::Continue),
        "ping" => Ok(CliCommand::Ping),
        "quit" | "exit" => Ok(CliCommand::Quit),
        other => Err(format!("unknown command '{other}'")),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_click_defaults_to_left() {
        assert_eq!(
            parse_line("click 100 200").unwrap(),
            CliCommand::Click {
                x: 100,
                y: 200,
                button: MouseButton::Left
            }
        );
        assert_eq!(
            parse_line("click 100 200 right").unwrap(),
            CliCommand::Click {
                x: 100,
                y: 200,
                button: MouseButton::Right
            }
        );
    }

    #[test]
    fn parse_move_and_key() {
        assert_eq!(
            parse_line("move 10 20").unwrap(),
            CliCommand::Move { x: 10, y: 20 }
        );
        assert_eq!(parse_line("key enter").unwrap(), CliCommand::Key("enter".into()));
    }

    #[test]
    fn parse_bare_commands() {
        assert_eq!(parse_line("pause").unwrap(), CliCommand::Pause);
        assert_eq!(parse_line("continue").unwrap(), CliCommand::Continue);
        assert_eq!(parse_line("ping").unwrap(), CliCommand::Ping);
        assert_eq!(parse_line("quit").unwrap(), CliCommand::Quit);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_line("").is_err());
        assert!(parse_line("click 1").is_err());
        assert!(parse_line("click a b").is_err());
        assert!(parse_line("click 1 2 middle").is_err());
        assert!(parse_line("teleport 1 2").is_err());
    }
}
