//! Controller-side frame receive loop.
//!
//! Owns the controller's datagram socket: registers its port with the
//! broker, classifies incoming datagrams, publishes the newest
//! decodable frame over a `tokio::sync::watch` channel (overwrite
//! semantics — only the latest frame matters), and detects direct
//! arrival from the streamer to trigger the one-shot `p2p_active`
//! signal.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::datagram::{ControlDatagram, Datagram};
use crate::error::ScryError;
use crate::stream::encoder::FrameDecoder;
use crate::stream::types::RawFrame;

// ── FrameStats ───────────────────────────────────────────────────

/// Receive-side statistics exposed alongside the frame channel.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Smoothed frames per second.
    pub fps: f64,
    /// Frames decoded since start.
    pub total_frames: u64,
    /// Encoded bytes received since start.
    pub total_bytes: u64,
    /// Last frame width.
    pub width: u32,
    /// Last frame height.
    pub height: u32,
    /// Frames that arrived directly from the streamer.
    pub p2p_frames: u64,
    /// Frames that arrived from any other source (the relay).
    pub relay_frames: u64,
}

// ── FrameReceiver ────────────────────────────────────────────────

/// The controller's datagram receive loop.
///
/// The receive wait is bounded so the stop handle is observed even
/// when the stream goes silent.
pub struct FrameReceiver<D> {
    socket: UdpSocket,
    broker_addr: SocketAddr,
    decoder: D,
    peer_rx: watch::Receiver<Option<IpAddr>>,
    running: Arc<AtomicBool>,
    frame_tx: watch::Sender<Option<RawFrame>>,
    frame_rx: watch::Receiver<Option<RawFrame>>,
    stats_tx: watch::Sender<FrameStats>,
    stats_rx: watch::Receiver<FrameStats>,
}

/// Bounded wait per receive so shutdown is observed.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

impl<D: FrameDecoder> FrameReceiver<D> {
    /// Wrap an already-bound socket.
    ///
    /// `broker_addr` is the relay's datagram endpoint (registration
    /// and the activation signal go there); `peer_rx` carries the
    /// streamer's IP once learned.
    pub fn new(
        socket: UdpSocket,
        broker_addr: SocketAddr,
        decoder: D,
        peer_rx: watch::Receiver<Option<IpAddr>>,
    ) -> Self {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(FrameStats::default());
        Self {
            socket,
            broker_addr,
            decoder,
            peer_rx,
            running: Arc::new(AtomicBool::new(false)),
            frame_tx,
            frame_rx,
            stats_tx,
            stats_rx,
        }
    }

    /// The local datagram endpoint.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Watch channel yielding the newest decoded frame.
    pub fn frame_receiver(&self) -> watch::Receiver<Option<RawFrame>> {
        self.frame_rx.clone()
    }

    /// Watch channel for receive statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats_rx.clone()
    }

    /// A cloneable stop handle.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Tell the broker which port this receiver listens on.
    pub async fn register(&self) -> Result<(), ScryError> {
        let port = self.socket.local_addr()?.port();
        let datagram = Datagram::Control(ControlDatagram::ControllerUdp { port }).encode()?;
        self.socket.send_to(&datagram, self.broker_addr).await?;
        info!("registered datagram port {port} with {}", self.broker_addr);
        Ok(())
    }

    /// Run the receive loop until the stop handle flips.
    pub async fn run(&mut self) -> Result<(), ScryError> {
        self.running.store(true, Ordering::SeqCst);
        self.register().await?;

        let mut buf = vec![0u8; 65_535];
        let mut stats = FrameStats::default();
        let mut p2p_receipts: u64 = 0;
        let mut fps_samples: Vec<Duration> = Vec::with_capacity(60);
        let mut last_frame_time = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let (len, src) =
                match tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf)).await {
                    Err(_) => continue, // bounded wait; re-check the flag
                    Ok(Err(e)) => {
                        warn!("datagram receive error: {e}");
                        continue;
                    }
                    Ok(Ok(pair)) => pair,
                };

            let payload = match Datagram::classify(&buf[..len]) {
                // Registration/control echoes are never image data.
                Ok(Datagram::Control(_)) => continue,
                Ok(Datagram::Frame(payload)) => payload,
                Err(e) => {
                    debug!("dropped datagram from {src}: {e}");
                    continue;
                }
            };

            let from_peer = self
                .peer_rx
                .borrow()
                .map(|ip| ip == src.ip())
                .unwrap_or(false);
            if from_peer {
                p2p_receipts += 1;
                stats.p2p_frames = p2p_receipts;
                if p2p_receipts == 1 {
                    info!("receiving directly from streamer at {src}");
                    self.signal_p2p_active().await;
                }
            } else {
                stats.relay_frames += 1;
            }

            stats.total_bytes += payload.len() as u64;

            let frame = match self.decoder.decode(&payload) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("dropped undecodable frame from {src}: {e}");
                    continue;
                }
            };

            stats.total_frames += 1;
            stats.width = frame.width;
            stats.height = frame.height;

            // Overwrite semantics: only the newest frame matters.
            let _ = self.frame_tx.send(Some(frame));

            let now = Instant::now();
            fps_samples.push(now.duration_since(last_frame_time));
            last_frame_time = now;
            if fps_samples.len() > 60 {
                fps_samples.remove(0);
            }
            let avg_secs =
                fps_samples.iter().map(|d| d.as_secs_f64()).sum::<f64>() / fps_samples.len() as f64;
            stats.fps = if avg_secs > 0.0 { 1.0 / avg_secs } else { 0.0 };

            let _ = self.stats_tx.send(stats.clone());
        }

        Ok(())
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    // ── Internal ─────────────────────────────────────────────────

    /// One best-effort `p2p_active` notification to the broker.
    async fn signal_p2p_active(&self) {
        let datagram = match Datagram::Control(ControlDatagram::P2pActive).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not build p2p_active signal: {e}");
                return;
            }
        };
        if let Err(e) = self.socket.send_to(&datagram, self.broker_addr).await {
            warn!("p2p_active signal failed (not retried): {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::encoder::{FrameEncoder, ZstdFrameCodec};
    use crate::stream::source::{FrameSource, SyntheticSource};

    async fn frame_datagram() -> Vec<u8> {
        let frame = SyntheticSource::new(800, 600).capture().unwrap();
        let encoded = ZstdFrameCodec::new().encode(&frame, 70).unwrap();
        Datagram::Frame(encoded).encode().unwrap()
    }

    #[tokio::test]
    async fn registers_then_publishes_newest_frame() {
        let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker_addr = broker.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = socket.local_addr().unwrap();
        let (_peer_tx, peer_rx) = watch::channel(None);

        let mut receiver = FrameReceiver::new(socket, broker_addr, ZstdFrameCodec::new(), peer_rx);
        let mut frames = receiver.frame_receiver();
        let stop = receiver.stop_handle();
        let handle = tokio::spawn(async move { receiver.run().await });

        // Registration datagram arrives at the broker.
        let mut buf = vec![0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), broker.recv_from(&mut buf))
            .await
            .expect("no registration")
            .unwrap();
        match Datagram::classify(&buf[..len]).unwrap() {
            Datagram::Control(ControlDatagram::ControllerUdp { port }) => {
                assert_eq!(port, receiver_addr.port());
            }
            other => panic!("expected registration, got {other:?}"),
        }

        // Deliver a frame (as the relay would).
        broker
            .send_to(&frame_datagram().await, receiver_addr)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), frames.changed())
            .await
            .expect("no frame published")
            .unwrap();
        let frame = frames.borrow_and_update().clone().unwrap();
        assert_eq!(frame.width, 800);
        assert_eq!(frame.height, 600);

        stop.store(false, Ordering::SeqCst);
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    #[tokio::test]
    async fn direct_arrival_triggers_one_activation_signal() {
        let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker_addr = broker.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = socket.local_addr().unwrap();
        let (_peer_tx, peer_rx) = watch::channel(Some("127.0.0.1".parse::<IpAddr>().unwrap()));

        let mut receiver = FrameReceiver::new(socket, broker_addr, ZstdFrameCodec::new(), peer_rx);
        let mut stats = receiver.stats_receiver();
        let stop = receiver.stop_handle();
        let handle = tokio::spawn(async move { receiver.run().await });

        // Drain the registration datagram.
        let mut buf = vec![0u8; 65_535];
        let _ = tokio::time::timeout(Duration::from_secs(5), broker.recv_from(&mut buf))
            .await
            .expect("no registration")
            .unwrap();

        // Two direct frames from the "streamer" (same IP as peer_rx).
        let streamer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dg = frame_datagram().await;
        streamer.send_to(&dg, receiver_addr).await.unwrap();
        streamer.send_to(&dg, receiver_addr).await.unwrap();

        // Exactly one p2p_active arrives at the broker.
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), broker.recv_from(&mut buf))
            .await
            .expect("no activation signal")
            .unwrap();
        assert_eq!(
            Datagram::classify(&buf[..len]).unwrap(),
            Datagram::Control(ControlDatagram::P2pActive)
        );
        let again =
            tokio::time::timeout(Duration::from_millis(400), broker.recv_from(&mut buf)).await;
        assert!(again.is_err(), "activation signal sent more than once");

        // Stats counted both direct frames.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                stats.changed().await.unwrap();
                if stats.borrow_and_update().p2p_frames >= 2 {
                    break;
                }
            }
        })
        .await
        .expect("p2p frames not counted");

        stop.store(false, Ordering::SeqCst);
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    #[tokio::test]
    async fn control_and_garbage_datagrams_never_become_frames() {
        let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker_addr = broker.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver_addr = socket.local_addr().unwrap();
        let (_peer_tx, peer_rx) = watch::channel(None);

        let mut receiver = FrameReceiver::new(socket, broker_addr, ZstdFrameCodec::new(), peer_rx);
        let frames = receiver.frame_receiver();
        let stop = receiver.stop_handle();
        let handle = tokio::spawn(async move { receiver.run().await });

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // A control datagram, an unknown discriminator, and an
        // undersized frame: none may surface as image data.
        sender
            .send_to(
                &Datagram::Control(ControlDatagram::P2pActive).encode().unwrap(),
                receiver_addr,
            )
            .await
            .unwrap();
        sender.send_to(&[0x7F; 2000], receiver_addr).await.unwrap();
        let mut undersized = vec![crate::datagram::FRAME_DISCRIMINATOR];
        undersized.extend_from_slice(&[0u8; 100]);
        sender.send_to(&undersized, receiver_addr).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(frames.borrow().is_none());

        stop.store(false, Ordering::SeqCst);
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
}
