//! The session broker.
//!
//! Accepts both roles on the TCP control port, authenticates the
//! controller against streamer-supplied credentials, relays control
//! commands between the roles, and forwards frame datagrams on the UDP
//! path until the controller confirms direct delivery.
//!
//! The per-run [`Session`] record is written by the accept handlers
//! and the datagram loop concurrently; every access goes through one
//! mutex, and no lock is held across an `await`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

use scry_core::datagram::{ControlDatagram, Datagram};
use scry_core::message::{AuthResponse, ControlFrame, Role};
use scry_core::session::{Credentials, PeerExchange, Session};
use scry_core::{ControlChannel, ScryError};

use crate::config::BrokerConfig;

/// How often the status line is logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

// ── Broker ───────────────────────────────────────────────────────

/// The broker process: one TCP listener, one UDP socket, one session.
pub struct Broker {
    listener: TcpListener,
    udp: Arc<UdpSocket>,
    session: Arc<Mutex<Session>>,
    frames_relayed: Arc<AtomicU64>,
}

impl Broker {
    /// Bind both listeners per the configuration.
    pub async fn bind(config: &BrokerConfig) -> Result<Self, std::io::Error> {
        let tcp_addr = format!("{}:{}", config.network.bind_addr, config.network.tcp_port);
        let udp_addr = format!("{}:{}", config.network.bind_addr, config.network.udp_port);

        let listener = TcpListener::bind(&tcp_addr).await?;
        let udp = UdpSocket::bind(&udp_addr).await?;
        info!("control listener on {}", listener.local_addr()?);
        info!("datagram relay on {}", udp.local_addr()?);

        Ok(Self {
            listener,
            udp: Arc::new(udp),
            session: Arc::new(Mutex::new(Session::new())),
            frames_relayed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The bound control address.
    pub fn tcp_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// The bound datagram address.
    pub fn udp_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.udp.local_addr()
    }

    /// Serve until the process is torn down.
    ///
    /// Nothing a single role does is fatal to the broker: a role
    /// disconnecting returns the session to the matching awaiting
    /// state and the loops keep serving.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let relay_session = Arc::clone(&self.session);
        let relay_udp = Arc::clone(&self.udp);
        let relay_counter = Arc::clone(&self.frames_relayed);
        tokio::spawn(async move {
            Self::run_relay(relay_udp, relay_session, relay_counter).await;
        });

        let status_session = Arc::clone(&self.session);
        let status_counter = Arc::clone(&self.frames_relayed);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATUS_INTERVAL);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let phase = status_session.lock().expect("session lock").phase().clone();
                info!(
                    "status: {} ({} frames relayed)",
                    phase,
                    status_counter.load(Ordering::Relaxed),
                );
            }
        });

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                Self::handle_connection(session, stream, peer).await;
            });
        }
    }

    // ── Control connections ──────────────────────────────────────

    /// Drive one control connection from handshake to close.
    async fn handle_connection(
        session: Arc<Mutex<Session>>,
        stream: TcpStream,
        peer: SocketAddr,
    ) {
        let mut channel = ControlChannel::new(stream);

        let hello = match channel.recv().await {
            Some(ControlFrame::Hello(hello)) => hello,
            Some(other) => {
                warn!("{peer} opened with a non-handshake frame: {other:?}");
                return;
            }
            None => return,
        };

        match hello.role {
            Role::Streamer => {
                let replaced = session.lock().expect("session lock").register_streamer(
                    peer.ip(),
                    channel.sender(),
                    Credentials {
                        session_id: hello.session_id.clone(),
                        password: hello.password,
                    },
                );
                if replaced {
                    // Documented policy: the newest streamer wins.
                    warn!("streamer {peer} replaced an existing registration");
                }
                info!(
                    "streamer connected from {peer} (session {})",
                    hello.session_id
                );

                Self::relay_role(&mut channel, &session, Role::Streamer).await;

                session.lock().expect("session lock").streamer_lost();
                info!("streamer disconnected");
            }
            Role::Controller => {
                let auth = session.lock().expect("session lock").authenticate_controller(
                    peer.ip(),
                    channel.sender(),
                    &hello.session_id,
                    &hello.password,
                );
                match auth {
                    Ok(peer_info) => {
                        if channel
                            .send(ControlFrame::Auth(AuthResponse::success(peer_info)))
                            .await
                            .is_err()
                        {
                            session.lock().expect("session lock").controller_lost();
                            return;
                        }
                        info!("controller authenticated from {peer}");
                    }
                    Err(e) => {
                        let reason = match e {
                            ScryError::Auth { reason } => reason,
                            other => other.to_string(),
                        };
                        warn!("controller {peer} rejected: {reason}");
                        let _ = channel
                            .send(ControlFrame::Auth(AuthResponse::error(reason)))
                            .await;
                        // Give the writer task a moment to flush the
                        // rejection before the connection drops.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        return;
                    }
                }

                Self::relay_role(&mut channel, &session, Role::Controller).await;

                session.lock().expect("session lock").controller_lost();
                info!("controller disconnected");
            }
        }
    }

    /// Pump one role's inbound commands to its peer until the
    /// connection closes. Connection loss is the sole cancellation
    /// signal; `DISCONNECT` is advisory and relayed like any command.
    async fn relay_role(channel: &mut ControlChannel, session: &Arc<Mutex<Session>>, from: Role) {
        while let Some(frame) = channel.recv().await {
            match frame {
                ControlFrame::Command(message) => {
                    debug!("{} -> peer: {}", from, message.command);
                    let delivered = session
                        .lock()
                        .expect("session lock")
                        .relay_control(from, message);
                    if !delivered {
                        warn!("no {} connected to receive command", from.peer());
                    }
                }
                other => {
                    warn!("{from} sent an unexpected frame mid-session: {other:?}");
                }
            }
        }
    }

    // ── Datagram relay ───────────────────────────────────────────

    /// The shared datagram loop: registration, activation signals, and
    /// frame forwarding. Each datagram is processed independently —
    /// loss and reordering never corrupt session state.
    async fn run_relay(
        udp: Arc<UdpSocket>,
        session: Arc<Mutex<Session>>,
        frames_relayed: Arc<AtomicU64>,
    ) {
        let mut buf = vec![0u8; 65_535];
        loop {
            let (len, src) = match udp.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("datagram receive error: {e}");
                    continue;
                }
            };

            match Datagram::classify(&buf[..len]) {
                Ok(Datagram::Control(ControlDatagram::ControllerUdp { port })) => {
                    let exchange = {
                        let mut session = session.lock().expect("session lock");
                        if session.register_datagram_endpoint(Role::Controller, src) {
                            info!("controller datagram endpoint registered: {src} (port {port})");
                        }
                        session.take_peer_exchange()
                    };
                    Self::dispatch_peer_exchange(exchange);
                }
                Ok(Datagram::Control(ControlDatagram::P2pActive)) => {
                    let activated = session.lock().expect("session lock").activate_p2p();
                    if activated {
                        info!("P2P confirmed by controller; relay forwarding suspended");
                    }
                }
                Ok(Datagram::Frame(_)) => {
                    let (target, exchange) = {
                        let mut session = session.lock().expect("session lock");
                        if session.register_datagram_endpoint(Role::Streamer, src) {
                            info!("streamer datagram endpoint observed: {src}");
                        }
                        (session.relay_target(), session.take_peer_exchange())
                    };
                    Self::dispatch_peer_exchange(exchange);

                    if let Some(target) = target {
                        match udp.send_to(&buf[..len], target).await {
                            Ok(_) => {
                                let relayed = frames_relayed.fetch_add(1, Ordering::Relaxed) + 1;
                                if relayed % 100 == 0 {
                                    debug!("relay mode: {relayed} frames forwarded");
                                }
                            }
                            Err(e) => debug!("relay forward to {target} failed: {e}"),
                        }
                    }
                }
                Err(e) => debug!("dropped datagram from {src}: {e}"),
            }
        }
    }

    /// Send the one-time `PEER_INFO` pair prepared under the lock.
    fn dispatch_peer_exchange(exchange: Option<PeerExchange>) {
        let Some(exchange) = exchange else { return };
        info!("both datagram endpoints known; exchanging peer info");
        let (streamer, to_streamer) = exchange.to_streamer;
        if streamer
            .try_send(ControlFrame::Command(to_streamer))
            .is_err()
        {
            warn!("could not queue peer info to streamer");
        }
        let (controller, to_controller) = exchange.to_controller;
        if controller
            .try_send(ControlFrame::Command(to_controller))
            .is_err()
        {
            warn!("could not queue peer info to controller");
        }
    }
}
