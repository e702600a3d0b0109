//! Streamer-side transmit loop.
//!
//! Orchestrates the full pipeline each iteration:
//!
//! 1. [`FrameSource`] acquires a raw frame.
//! 2. The frame is downsampled to the canonical stream geometry.
//! 3. [`MotionGate`] decides whether anything worth sending changed.
//! 4. [`FrameEncoder`] compresses at the current adaptive quality.
//! 5. The datagram goes out P2P-if-available-else-relay.
//!
//! The loop paces itself to the target frame interval, pauses on a
//! shared flag without capturing, and respects a stop flag.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::datagram::Datagram;
use crate::error::ScryError;
use crate::stream::encoder::FrameEncoder;
use crate::stream::motion::{GateDecision, MotionGate, MotionGateConfig};
use crate::stream::quality::{QualityChange, QualityConfig, QualityController};
use crate::stream::source::FrameSource;

// ── TransmitterConfig ────────────────────────────────────────────

/// Configuration for [`StreamTransmitter`].
#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    /// Canonical stream width — a protocol invariant the controller
    /// relies on for coordinate scaling.
    pub stream_width: u32,
    /// Canonical stream height.
    pub stream_height: u32,
    /// Target frames per second.
    pub target_fps: u8,
    /// Motion gate tuning.
    pub motion: MotionGateConfig,
    /// Adaptive quality tuning.
    pub quality: QualityConfig,
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            stream_width: 800,
            stream_height: 600,
            target_fps: 30,
            motion: MotionGateConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

// ── StreamTransmitter ────────────────────────────────────────────

/// The streamer's capture → gate → encode → send loop.
///
/// # Transport selection
///
/// While a peer endpoint is present in `peer_rx` and no P2P send has
/// failed, frames go directly to the peer. The first send failure
/// clears P2P for the remainder of the session; from then on every
/// frame goes to the relay. Frames are never buffered or resent.
pub struct StreamTransmitter<S, E> {
    source: S,
    encoder: E,
    gate: MotionGate,
    quality: QualityController,
    socket: UdpSocket,
    relay_addr: SocketAddr,
    peer_rx: watch::Receiver<Option<SocketAddr>>,
    p2p_failed: bool,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    config: TransmitterConfig,
    frames_sent: u64,
    frames_skipped: u64,
}

impl<S: FrameSource, E: FrameEncoder> StreamTransmitter<S, E> {
    pub fn new(
        source: S,
        encoder: E,
        socket: UdpSocket,
        relay_addr: SocketAddr,
        peer_rx: watch::Receiver<Option<SocketAddr>>,
        config: TransmitterConfig,
    ) -> Self {
        let gate = MotionGate::new(config.motion.clone());
        let quality = QualityController::new(config.quality.clone());
        Self {
            source,
            encoder,
            gate,
            quality,
            socket,
            relay_addr,
            peer_rx,
            p2p_failed: false,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            config,
            frames_sent: 0,
            frames_skipped: 0,
        }
    }

    /// A cloneable handle to stop the loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// A cloneable handle for the PAUSE/CONTINUE flag.
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    /// Frames transmitted so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// The transmit socket's local address.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Run the transmit loop until the stop handle flips.
    pub async fn run(&mut self) -> Result<(), ScryError> {
        self.running.store(true, Ordering::SeqCst);
        let interval = Duration::from_secs_f64(1.0 / self.config.target_fps as f64);
        info!(
            "streaming {}x{} at {} fps, relay {}",
            self.config.stream_width, self.config.stream_height, self.config.target_fps,
            self.relay_addr,
        );

        while self.running.load(Ordering::SeqCst) {
            let iteration_start = Instant::now();

            if self.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }

            // 1. Capture.
            let raw = match self.source.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("capture failed, skipping iteration: {e}");
                    Self::pace(iteration_start, interval).await;
                    continue;
                }
            };

            // 2. Canonical geometry.
            let frame = raw.downsample(self.config.stream_width, self.config.stream_height);

            // 3. Motion gate.
            let change_percent = match self.gate.evaluate(&frame) {
                GateDecision::Skip { .. } => {
                    self.frames_skipped += 1;
                    Self::pace(iteration_start, interval).await;
                    continue;
                }
                GateDecision::Transmit { change_percent } => change_percent,
            };

            // 4. Encode at the current quality.
            let encoded = match self.encoder.encode(&frame, self.quality.quality()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("encode failed, skipping iteration: {e}");
                    Self::pace(iteration_start, interval).await;
                    continue;
                }
            };

            // 5. Send.
            let datagram = match Datagram::Frame(encoded).encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("frame does not fit a datagram, dropping: {e}");
                    Self::pace(iteration_start, interval).await;
                    continue;
                }
            };
            if self.transmit(&datagram).await {
                self.frames_sent += 1;

                if let Some(change) = self.quality.record(iteration_start.elapsed()) {
                    match change {
                        QualityChange::Decreased(q) => info!("reducing quality to {q}"),
                        QualityChange::Increased(q) => info!("increasing quality to {q}"),
                    }
                }
                if self.frames_sent % 100 == 0 {
                    debug!(
                        "frames {} ({} skipped), {} bytes, q {}, motion {:.1}%",
                        self.frames_sent,
                        self.frames_skipped,
                        datagram.len(),
                        self.quality.quality(),
                        change_percent,
                    );
                }
            }

            // 6. Frame pacing.
            Self::pace(iteration_start, interval).await;
        }

        Ok(())
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Send one datagram, preferring the direct path. Returns `true`
    /// when the bytes left this host on either path.
    async fn transmit(&mut self, datagram: &[u8]) -> bool {
        let peer = if self.p2p_failed {
            None
        } else {
            *self.peer_rx.borrow()
        };

        if let Some(peer) = peer {
            match self.socket.send_to(datagram, peer).await {
                Ok(_) => return true,
                Err(e) => {
                    // One strike: relay for the rest of the session.
                    warn!("P2P send to {peer} failed ({e}); falling back to relay");
                    self.p2p_failed = true;
                }
            }
        }

        match self.socket.send_to(datagram, self.relay_addr).await {
            Ok(_) => true,
            Err(e) => {
                warn!("relay send failed, frame dropped: {e}");
                false
            }
        }
    }

    /// Sleep for the remainder of the frame interval.
    async fn pace(iteration_start: Instant, interval: Duration) {
        let elapsed = iteration_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}
