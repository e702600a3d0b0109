//! Streamer service: control command handling plus the transmit loop.
//!
//! Owns the control connection to the broker and a
//! [`StreamTransmitter`] running in its own task. Received commands
//! either flip transmitter flags (PAUSE/CONTINUE), update the P2P peer
//! endpoint (PEER_INFO), or are replayed through the [`InputInjector`]
//! after scaling from stream space to the real screen.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use scry_core::message::{
    Command, ControlFrame, ControlMessage, Hello, KeyPress, MouseClick, MouseMove, PeerInfo, Role,
};
use scry_core::session::Credentials;
use scry_core::stream::geometry::stream_to_screen;
use scry_core::stream::{InputInjector, StreamTransmitter, SyntheticSource, ZstdFrameCodec};
use scry_core::{ControlChannel, ScryError};

use crate::config::StreamerConfig;

// ── CommandOutcome ───────────────────────────────────────────────

/// What the command loop should do after applying one command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Disconnect,
}

// ── Streamer ─────────────────────────────────────────────────────

/// The streamer process: generates credentials at startup and serves
/// one session until disconnected.
pub struct Streamer {
    config: StreamerConfig,
    credentials: Credentials,
}

impl Streamer {
    pub fn new(config: StreamerConfig) -> Self {
        Self {
            config,
            credentials: Credentials::generate(),
        }
    }

    /// The credentials a controller must present.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Connect to the broker and serve until DISCONNECT or connection
    /// loss.
    pub async fn run(&self, injector: &mut (dyn InputInjector + Send)) -> Result<(), ScryError> {
        let control_addr = format!(
            "{}:{}",
            self.config.network.broker_addr, self.config.network.tcp_port
        );
        let mut channel = ControlChannel::connect(&control_addr).await?;
        channel
            .send(ControlFrame::Hello(Hello {
                role: Role::Streamer,
                session_id: self.credentials.session_id.clone(),
                password: self.credentials.password.clone(),
            }))
            .await?;
        info!("connected to broker at {control_addr}");
        info!("session id: {}", self.credentials.session_id);
        info!("password:   {}", self.credentials.password);

        let relay_addr = resolve(
            &self.config.network.broker_addr,
            self.config.network.udp_port,
        )
        .await?;
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        let (peer_tx, peer_rx) = watch::channel(None);
        let mut transmitter = StreamTransmitter::new(
            SyntheticSource::new(self.config.screen.width, self.config.screen.height),
            ZstdFrameCodec::new(),
            socket,
            relay_addr,
            peer_rx,
            self.config.transmitter_config(),
        );
        let stop = transmitter.stop_handle();
        let paused = transmitter.pause_handle();
        let transmit_handle = tokio::spawn(async move { transmitter.run().await });

        // Command loop: connection loss is the sole cancellation
        // signal.
        while let Some(frame) = channel.recv().await {
            match frame {
                ControlFrame::Command(message) => {
                    let outcome = apply_command(
                        &message,
                        injector,
                        (self.config.stream.width, self.config.stream.height),
                        (self.config.screen.width, self.config.screen.height),
                        &paused,
                        &peer_tx,
                    );
                    if outcome == CommandOutcome::Disconnect {
                        info!("disconnect requested");
                        break;
                    }
                }
                other => warn!("unexpected frame from broker: {other:?}"),
            }
        }

        stop.store(false, Ordering::SeqCst);
        match transmit_handle.await {
            Ok(result) => result?,
            Err(e) => warn!("transmit task panicked: {e}"),
        }
        info!("streamer stopped");
        Ok(())
    }
}

// ── Command application ──────────────────────────────────────────

/// Apply one relayed command.
///
/// Malformed payloads are dropped with a log line; the loop continues.
pub fn apply_command(
    message: &ControlMessage,
    injector: &mut (dyn InputInjector + Send),
    stream: (u32, u32),
    screen: (u32, u32),
    paused: &Arc<AtomicBool>,
    peer_tx: &watch::Sender<Option<SocketAddr>>,
) -> CommandOutcome {
    match message.command {
        Command::MouseClick => match message.payload_as::<MouseClick>() {
            Ok(click) => {
                let (x, y) =
                    stream_to_screen(click.x, click.y, stream.0, stream.1, screen.0, screen.1);
                if let Err(e) = injector.click(x, y, click.button) {
                    warn!("click injection failed: {e}");
                }
            }
            Err(e) => warn!("malformed MOUSE_CLICK payload dropped: {e}"),
        },
        Command::MouseMove => match message.payload_as::<MouseMove>() {
            Ok(mv) => {
                let (x, y) = stream_to_screen(mv.x, mv.y, stream.0, stream.1, screen.0, screen.1);
                if let Err(e) = injector.move_to(x, y) {
                    warn!("move injection failed: {e}");
                }
            }
            Err(e) => warn!("malformed MOUSE_MOVE payload dropped: {e}"),
        },
        Command::KeyPress => match message.payload_as::<KeyPress>() {
            Ok(kp) => {
                if let Err(e) = injector.key_press(&kp.key) {
                    warn!("key injection failed: {e}");
                }
            }
            Err(e) => warn!("malformed KEY_PRESS payload dropped: {e}"),
        },
        Command::Pause => {
            paused.store(true, Ordering::SeqCst);
            info!("stream paused");
        }
        Command::Continue => {
            paused.store(false, Ordering::SeqCst);
            info!("stream resumed");
        }
        Command::PeerInfo => match message.payload_as::<PeerInfo>() {
            Ok(info) => match info.peer_ip.parse::<IpAddr>() {
                Ok(ip) => {
                    let addr = SocketAddr::new(ip, info.peer_port);
                    info!("peer endpoint learned: {addr}; attempting direct delivery");
                    let _ = peer_tx.send(Some(addr));
                }
                Err(e) => warn!("unparseable peer ip '{}': {e}", info.peer_ip),
            },
            Err(e) => warn!("malformed PEER_INFO payload dropped: {e}"),
        },
        Command::Ping => debug!("ping received"),
        Command::Disconnect => return CommandOutcome::Disconnect,
    }
    CommandOutcome::Continue
}

/// Resolve a host/port pair to the first usable socket address.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ScryError> {
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| ScryError::Other(format!("no address found for {host}:{port}")))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scry_core::message::MouseButton;
    use scry_core::stream::{InputEvent, RecordingInjector};
    use serde_json::json;

    fn flags() -> (Arc<AtomicBool>, watch::Sender<Option<SocketAddr>>) {
        (Arc::new(AtomicBool::new(false)), watch::channel(None).0)
    }

    #[test]
    fn click_scales_from_stream_to_screen() {
        let mut injector = RecordingInjector::default();
        let (paused, peer_tx) = flags();

        let outcome = apply_command(
            &ControlMessage::mouse_click(400, 300, MouseButton::Left),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );

        assert_eq!(outcome, CommandOutcome::Continue);
        assert_eq!(
            injector.events,
            vec![InputEvent::Click {
                x: 960,
                y: 540,
                button: MouseButton::Left
            }]
        );
    }

    #[test]
    fn move_and_key_reach_the_injector() {
        let mut injector = RecordingInjector::default();
        let (paused, peer_tx) = flags();

        apply_command(
            &ControlMessage::mouse_move(0, 0),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );
        apply_command(
            &ControlMessage::key_press("enter"),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );

        assert_eq!(
            injector.events,
            vec![
                InputEvent::Move { x: 0, y: 0 },
                InputEvent::Key("enter".into()),
            ]
        );
    }

    #[test]
    fn pause_and_continue_flip_the_flag() {
        let mut injector = RecordingInjector::default();
        let (paused, peer_tx) = flags();

        apply_command(
            &ControlMessage::pause(),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );
        assert!(paused.load(Ordering::SeqCst));

        apply_command(
            &ControlMessage::resume(),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );
        assert!(!paused.load(Ordering::SeqCst));
        assert!(injector.events.is_empty());
    }

    #[test]
    fn peer_info_updates_the_watch() {
        let mut injector = RecordingInjector::default();
        let paused = Arc::new(AtomicBool::new(false));
        let (peer_tx, peer_rx) = watch::channel(None);

        apply_command(
            &ControlMessage::peer_info("10.1.2.3", 48231),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );

        assert_eq!(
            *peer_rx.borrow(),
            Some("10.1.2.3:48231".parse::<SocketAddr>().unwrap())
        );
    }

    #[test]
    fn malformed_payload_is_dropped_not_fatal() {
        let mut injector = RecordingInjector::default();
        let (paused, peer_tx) = flags();

        let bogus = ControlMessage::new(Command::MouseClick, json!({"x": "left"}));
        let outcome = apply_command(
            &bogus,
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );

        assert_eq!(outcome, CommandOutcome::Continue);
        assert!(injector.events.is_empty());
    }

    #[test]
    fn disconnect_ends_the_loop() {
        let mut injector = RecordingInjector::default();
        let (paused, peer_tx) = flags();

        let outcome = apply_command(
            &ControlMessage::disconnect(),
            &mut injector,
            (800, 600),
            (1920, 1080),
            &paused,
            &peer_tx,
        );
        assert_eq!(outcome, CommandOutcome::Disconnect);
    }

    #[test]
    fn generated_credentials_are_printed_shape() {
        let streamer = Streamer::new(StreamerConfig::default());
        assert_eq!(streamer.credentials().session_id.len(), 9);
        assert_eq!(streamer.credentials().password.len(), 6);
    }
}
