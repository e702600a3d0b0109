//! Adaptive encode-quality controller.
//!
//! Tracks per-frame processing durations over a rolling window and
//! nudges the quality up or down by a fixed step at a fixed cadence.
//! A discrete hill-climber: it converges over several adjustments, it
//! does not jump.

use std::collections::VecDeque;
use std::time::Duration;

// ── QualityConfig ────────────────────────────────────────────────

/// Tuning for [`QualityController`].
#[derive(Debug, Clone)]
pub struct QualityConfig {
    /// Starting quality.
    pub initial: u8,
    /// Lower bound.
    pub min: u8,
    /// Upper bound.
    pub max: u8,
    /// Amount added or removed per adjustment.
    pub step: u8,
    /// Frame rate the pipeline is expected to sustain.
    pub target_fps: u8,
    /// Number of duration samples kept in the rolling window.
    pub window: usize,
    /// Transmitted frames between adjustment checks.
    pub adjust_interval: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            initial: 70,
            min: 50,
            max: 85,
            step: 5,
            target_fps: 30,
            window: 10,
            adjust_interval: 30,
        }
    }
}

// ── QualityChange ────────────────────────────────────────────────

/// An adjustment made by [`QualityController::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityChange {
    /// Pipeline too slow: quality lowered to the contained value.
    Decreased(u8),
    /// Plenty of headroom: quality raised to the contained value.
    Increased(u8),
}

// ── QualityController ────────────────────────────────────────────

/// Rolling-window duration tracker with stepwise quality adjustment.
pub struct QualityController {
    config: QualityConfig,
    quality: u8,
    durations: VecDeque<Duration>,
    frames_since_adjust: u32,
}

impl QualityController {
    pub fn new(config: QualityConfig) -> Self {
        let quality = config.initial.clamp(config.min, config.max);
        let window = config.window;
        Self {
            config,
            quality,
            durations: VecDeque::with_capacity(window),
            frames_since_adjust: 0,
        }
    }

    /// Current quality value.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Record one transmitted frame's processing duration.
    ///
    /// Every `adjust_interval` transmitted frames the window average is
    /// compared against the target frame interval: above 120 % lowers
    /// quality one step, below 80 % raises it one step. Skipped frames
    /// must not be recorded.
    pub fn record(&mut self, frame_time: Duration) -> Option<QualityChange> {
        self.durations.push_back(frame_time);
        while self.durations.len() > self.config.window {
            self.durations.pop_front();
        }

        self.frames_since_adjust += 1;
        if self.frames_since_adjust < self.config.adjust_interval {
            return None;
        }
        self.frames_since_adjust = 0;

        let avg_secs = self.durations.iter().map(|d| d.as_secs_f64()).sum::<f64>()
            / self.durations.len() as f64;
        let target_secs = 1.0 / self.config.target_fps as f64;

        if avg_secs > target_secs * 1.2 && self.quality > self.config.min {
            self.quality = self
                .quality
                .saturating_sub(self.config.step)
                .max(self.config.min);
            Some(QualityChange::Decreased(self.quality))
        } else if avg_secs < target_secs * 0.8 && self.quality < self.config.max {
            self.quality = self
                .quality
                .saturating_add(self.config.step)
                .min(self.config.max);
            Some(QualityChange::Increased(self.quality))
        } else {
            None
        }
    }
}
