//! Motion gating between consecutive frames.
//!
//! Each candidate frame is reduced to a small grayscale proxy and
//! compared pixel-for-pixel against the previous proxy. Frames whose
//! changed fraction stays under the threshold are skipped, bounded by
//! a skip budget so a static screen is still refreshed periodically.

use crate::stream::types::RawFrame;

// ── MotionGateConfig ─────────────────────────────────────────────

/// Tuning for [`MotionGate`].
#[derive(Debug, Clone)]
pub struct MotionGateConfig {
    /// Proxy width in pixels.
    pub proxy_width: u32,
    /// Proxy height in pixels.
    pub proxy_height: u32,
    /// Absolute intensity delta for a pixel to count as changed.
    pub pixel_delta: u8,
    /// Changed-pixel percentage above which the frame counts as motion.
    pub threshold_percent: f64,
    /// Maximum consecutive skips before a refresh is forced.
    pub max_skip_frames: u32,
}

impl Default for MotionGateConfig {
    fn default() -> Self {
        Self {
            proxy_width: 160,
            proxy_height: 120,
            pixel_delta: 30,
            threshold_percent: 5.0,
            max_skip_frames: 5,
        }
    }
}

// ── GateDecision ─────────────────────────────────────────────────

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Transmit this frame.
    Transmit {
        /// Percentage of proxy pixels that changed.
        change_percent: f64,
    },
    /// Skip this frame; it counts toward the skip budget.
    Skip { change_percent: f64 },
}

impl GateDecision {
    pub fn is_transmit(&self) -> bool {
        matches!(self, GateDecision::Transmit { .. })
    }
}

// ── MotionGate ───────────────────────────────────────────────────

/// Stateful skip-if-static gate.
///
/// The first frame after construction or [`reset`](Self::reset) is
/// always transmitted.
pub struct MotionGate {
    config: MotionGateConfig,
    previous: Option<Vec<u8>>,
    skipped: u32,
}

impl MotionGate {
    pub fn new(config: MotionGateConfig) -> Self {
        Self {
            config,
            previous: None,
            skipped: 0,
        }
    }

    /// Forget the previous proxy, forcing the next frame through.
    pub fn reset(&mut self) {
        self.previous = None;
        self.skipped = 0;
    }

    /// Decide whether `frame` should be transmitted.
    pub fn evaluate(&mut self, frame: &RawFrame) -> GateDecision {
        let proxy = frame
            .downsample(self.config.proxy_width, self.config.proxy_height)
            .to_luma()
            .data;

        let previous = match &self.previous {
            Some(prev) if prev.len() == proxy.len() => prev,
            _ => {
                self.previous = Some(proxy);
                self.skipped = 0;
                return GateDecision::Transmit {
                    change_percent: 100.0,
                };
            }
        };

        let changed = proxy
            .iter()
            .zip(previous.iter())
            .filter(|(a, b)| a.abs_diff(**b) > self.config.pixel_delta)
            .count();
        let change_percent = changed as f64 / proxy.len() as f64 * 100.0;

        if change_percent > self.config.threshold_percent {
            self.previous = Some(proxy);
            self.skipped = 0;
            return GateDecision::Transmit { change_percent };
        }

        if self.skipped < self.config.max_skip_frames {
            self.skipped += 1;
            return GateDecision::Skip { change_percent };
        }

        // Staleness bound: the skip budget is spent, refresh even
        // without motion. The stored proxy stays as-is.
        self.skipped = 0;
        GateDecision::Transmit { change_percent }
    }
}
