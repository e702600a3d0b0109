//! Session state for the broker.
//!
//! One [`Session`] record exists per broker instance: at most one
//! streamer and one controller. The record is shared between the TCP
//! accept handlers and the datagram relay loop, so the broker keeps it
//! behind a single mutex; every method here is synchronous and never
//! blocks, which keeps critical sections short.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::channel::ControlSender;
use crate::error::ScryError;
use crate::message::{ControlFrame, ControlMessage, Role, StreamerPeerInfo};

// ── Credentials ──────────────────────────────────────────────────

/// The session id / password pair a streamer registers at startup.
///
/// Generated once per process and never rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Fixed-length numeric string (9 digits).
    pub session_id: String,
    /// Fixed-length alphanumeric string (6 characters).
    pub password: String,
}

impl Credentials {
    /// Generate a fresh random pair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let session_id = (0..9)
            .map(|_| char::from(b'0' + rng.gen_range(0..10)))
            .collect();
        let password = rng
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Self {
            session_id,
            password,
        }
    }

    /// Exact, case-sensitive comparison. No retries or lockout exist
    /// at this layer.
    pub fn matches(&self, session_id: &str, password: &str) -> bool {
        self.session_id == session_id && self.password == password
    }
}

// ── SessionPhase ─────────────────────────────────────────────────

/// Lifecycle of the single broker session.
///
/// ```text
/// AwaitingStreamer ──► AwaitingController ──► Relay ──► P2pAttempted ──► P2pActive
///        ▲                     ▲                │            │               │
///        │                     └────────────────┴────────────┴───────────────┘
///        └── streamer lost from anywhere         (controller lost)
/// ```
///
/// There is no broker-driven transition out of `P2pActive` back to
/// `Relay`; falling back is the streamer's decision alone, expressed
/// by simply resuming relay-addressed sends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No streamer has registered credentials yet.
    #[default]
    AwaitingStreamer,

    /// A streamer is registered; waiting for a controller to
    /// authenticate.
    AwaitingController,

    /// Both sides connected; frames travel through the relay.
    Relay {
        /// When the session became established.
        since: Instant,
    },

    /// Peer endpoints have been exchanged; a direct path may come up.
    P2pAttempted,

    /// The controller confirmed direct receipt; relay is optional.
    P2pActive,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingStreamer => write!(f, "AwaitingStreamer"),
            Self::AwaitingController => write!(f, "AwaitingController"),
            Self::Relay { .. } => write!(f, "Relay"),
            Self::P2pAttempted => write!(f, "P2pAttempted"),
            Self::P2pActive => write!(f, "P2pActive"),
        }
    }
}

impl SessionPhase {
    /// Returns `true` once both sides are connected.
    pub fn is_established(&self) -> bool {
        matches!(
            self,
            Self::Relay { .. } | Self::P2pAttempted | Self::P2pActive
        )
    }

    /// Returns `true` while direct delivery is confirmed.
    pub fn is_p2p_active(&self) -> bool {
        matches!(self, Self::P2pActive)
    }

    /// How long the session has been established, if it is.
    pub fn established_duration(&self) -> Option<Duration> {
        match self {
            Self::Relay { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// A streamer registered credentials.
    ///
    /// Valid from: `AwaitingStreamer`.
    pub fn streamer_attached(&mut self) -> Result<(), ScryError> {
        match self {
            Self::AwaitingStreamer => {
                *self = Self::AwaitingController;
                Ok(())
            }
            _ => Err(ScryError::Protocol(
                "cannot attach streamer: not in AwaitingStreamer state",
            )),
        }
    }

    /// A controller authenticated successfully.
    ///
    /// Valid from: `AwaitingController`.
    pub fn controller_authenticated(&mut self) -> Result<(), ScryError> {
        match self {
            Self::AwaitingController => {
                *self = Self::Relay {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(ScryError::Protocol(
                "cannot authenticate controller: not in AwaitingController state",
            )),
        }
    }

    /// Peer endpoints were exchanged with both sides.
    ///
    /// Valid from: `Relay`.
    pub fn p2p_attempted(&mut self) -> Result<(), ScryError> {
        match self {
            Self::Relay { .. } => {
                *self = Self::P2pAttempted;
                Ok(())
            }
            _ => Err(ScryError::Protocol(
                "cannot mark p2p attempt: not in Relay state",
            )),
        }
    }

    /// The controller signalled direct receipt.
    ///
    /// Valid from: `Relay`, `P2pAttempted`.
    pub fn p2p_activated(&mut self) -> Result<(), ScryError> {
        match self {
            Self::Relay { .. } | Self::P2pAttempted => {
                *self = Self::P2pActive;
                Ok(())
            }
            _ => Err(ScryError::Protocol(
                "cannot activate p2p: session not established",
            )),
        }
    }

    /// Force-reset after a streamer connection loss, from any state.
    pub fn reset_to_awaiting_streamer(&mut self) {
        *self = Self::AwaitingStreamer;
    }

    /// Force-reset after a controller connection loss, from any state.
    pub fn reset_to_awaiting_controller(&mut self) {
        *self = Self::AwaitingController;
    }
}

// ── PeerExchange ─────────────────────────────────────────────────

/// Prepared `PEER_INFO` notifications for both sides.
///
/// Built under the session lock, dispatched outside it.
#[derive(Debug)]
pub struct PeerExchange {
    pub to_streamer: (ControlSender, ControlMessage),
    pub to_controller: (ControlSender, ControlMessage),
}

// ── Session ──────────────────────────────────────────────────────

/// The broker's per-run session record.
///
/// Datagram endpoints are learned, not owned — they are observed
/// source addresses of externally-owned sockets. Control senders own
/// nothing but a queue into the per-connection writer task.
#[derive(Debug, Default)]
pub struct Session {
    phase: SessionPhase,
    credentials: Option<Credentials>,
    streamer: Option<ControlSender>,
    controller: Option<ControlSender>,
    streamer_ip: Option<IpAddr>,
    controller_ip: Option<IpAddr>,
    streamer_udp: Option<SocketAddr>,
    controller_udp: Option<SocketAddr>,
    peer_info_sent: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    // ── Registration & authentication ────────────────────────────

    /// Store a streamer's credentials and control sender.
    ///
    /// Always succeeds. A second streamer connecting overwrites the
    /// first — documented policy, not an error. Returns `true` when an
    /// existing registration was replaced.
    pub fn register_streamer(
        &mut self,
        ip: IpAddr,
        sender: ControlSender,
        credentials: Credentials,
    ) -> bool {
        let replaced = self.streamer.is_some();
        if matches!(self.phase, SessionPhase::AwaitingStreamer) {
            // Infallible from AwaitingStreamer.
            let _ = self.phase.streamer_attached();
        }
        self.credentials = Some(credentials);
        self.streamer = Some(sender);
        self.streamer_ip = Some(ip);
        // A new streamer's datagram endpoint is unknown until it sends.
        self.streamer_udp = None;
        self.peer_info_sent = false;
        replaced
    }

    /// Check a controller's credentials and, on success, attach it.
    ///
    /// Fails with [`ScryError::Auth`] when no streamer has registered
    /// or the pair does not match exactly.
    pub fn authenticate_controller(
        &mut self,
        ip: IpAddr,
        sender: ControlSender,
        session_id: &str,
        password: &str,
    ) -> Result<Option<StreamerPeerInfo>, ScryError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ScryError::auth("no streamer registered"))?;
        if !credentials.matches(session_id, password) {
            return Err(ScryError::auth("Invalid Session ID or Password"));
        }

        if matches!(self.phase, SessionPhase::AwaitingController) {
            self.phase.controller_authenticated()?;
        }
        self.controller = Some(sender);
        self.controller_ip = Some(ip);

        Ok(self.streamer_peer_info())
    }

    /// The streamer's known connection info, for a P2P attempt.
    pub fn streamer_peer_info(&self) -> Option<StreamerPeerInfo> {
        self.streamer_ip.map(|ip| StreamerPeerInfo {
            ip: ip.to_string(),
            udp_addr: self.streamer_udp.map(|a| a.to_string()),
            connected: self.streamer.is_some(),
        })
    }

    // ── Control relay ────────────────────────────────────────────

    /// Forward a command verbatim to the other role.
    ///
    /// Returns `false` (not an error) when the peer is absent or its
    /// queue is unavailable.
    pub fn relay_control(&self, from: Role, message: ControlMessage) -> bool {
        let target = match from {
            Role::Controller => self.streamer.as_ref(),
            Role::Streamer => self.controller.as_ref(),
        };
        match target {
            Some(sender) => sender.try_send(ControlFrame::Command(message)).is_ok(),
            None => false,
        }
    }

    // ── Datagram endpoints ───────────────────────────────────────

    /// Record the endpoint a role's datagram traffic arrives from.
    ///
    /// Idempotent; last write wins so a role reconnecting from a new
    /// address updates the record. Returns `true` when the stored
    /// value changed.
    pub fn register_datagram_endpoint(&mut self, role: Role, addr: SocketAddr) -> bool {
        let slot = match role {
            Role::Streamer => &mut self.streamer_udp,
            Role::Controller => &mut self.controller_udp,
        };
        let changed = *slot != Some(addr);
        if changed {
            debug!("{role} datagram endpoint -> {addr}");
            *slot = Some(addr);
        }
        changed
    }

    /// Once both datagram endpoints are known, build the one-time
    /// `PEER_INFO` exchange for both sides.
    pub fn take_peer_exchange(&mut self) -> Option<PeerExchange> {
        if self.peer_info_sent {
            return None;
        }
        let (streamer_udp, controller_udp) = match (self.streamer_udp, self.controller_udp) {
            (Some(s), Some(c)) => (s, c),
            _ => return None,
        };
        let (streamer, controller) = match (&self.streamer, &self.controller) {
            (Some(s), Some(c)) => (s.clone(), c.clone()),
            _ => return None,
        };

        self.peer_info_sent = true;
        if matches!(self.phase, SessionPhase::Relay { .. }) {
            let _ = self.phase.p2p_attempted();
        }

        Some(PeerExchange {
            to_streamer: (
                streamer,
                ControlMessage::peer_info(controller_udp.ip().to_string(), controller_udp.port()),
            ),
            to_controller: (
                controller,
                ControlMessage::peer_info(streamer_udp.ip().to_string(), streamer_udp.port()),
            ),
        })
    }

    // ── P2P activation ───────────────────────────────────────────

    /// Handle a `p2p_active` signal from the controller.
    ///
    /// Returns `true` on the first activation; duplicates are ignored.
    /// The flag never reverts — a later relay-mode datagram does not
    /// clear it.
    pub fn activate_p2p(&mut self) -> bool {
        if self.phase.is_p2p_active() {
            return false;
        }
        self.phase.p2p_activated().is_ok()
    }

    /// Whether direct delivery has been confirmed.
    pub fn p2p_active(&self) -> bool {
        self.phase.is_p2p_active()
    }

    /// Where relay-path frames should be forwarded, or `None` while
    /// the controller endpoint is unknown or P2P has taken over.
    pub fn relay_target(&self) -> Option<SocketAddr> {
        if self.phase.is_p2p_active() {
            return None;
        }
        self.controller_udp
    }

    /// The controller's registered datagram endpoint, if known.
    pub fn controller_udp(&self) -> Option<SocketAddr> {
        self.controller_udp
    }

    /// The streamer's observed datagram endpoint, if known.
    pub fn streamer_udp(&self) -> Option<SocketAddr> {
        self.streamer_udp
    }

    // ── Disconnect cleanup ───────────────────────────────────────

    /// Clear all streamer state after its control connection closed.
    pub fn streamer_lost(&mut self) {
        self.streamer = None;
        self.streamer_ip = None;
        self.streamer_udp = None;
        self.credentials = None;
        self.peer_info_sent = false;
        self.phase.reset_to_awaiting_streamer();
    }

    /// Clear all controller state after its control connection closed.
    pub fn controller_lost(&mut self) {
        self.controller = None;
        self.controller_ip = None;
        self.controller_udp = None;
        self.peer_info_sent = false;
        if self.credentials.is_some() {
            self.phase.reset_to_awaiting_controller();
        } else {
            self.phase.reset_to_awaiting_streamer();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
