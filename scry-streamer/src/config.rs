//! Streamer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use scry_core::stream::{MotionGateConfig, QualityConfig, TransmitterConfig};

/// Top-level configuration for the streamer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Canonical stream geometry and pacing.
    pub stream: StreamConfig,
    /// Motion gate tuning.
    pub motion: MotionConfig,
    /// Adaptive quality tuning.
    pub quality: QualityTuning,
    /// Real screen geometry for input scaling.
    pub screen: ScreenConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Broker host or IP.
    pub broker_addr: String,
    /// Broker TCP control port.
    pub tcp_port: u16,
    /// Broker UDP frame port.
    pub udp_port: u16,
}

/// Canonical stream geometry — the controller relies on this for
/// coordinate scaling, so both ends must agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u8,
}

/// Motion gate tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub threshold_percent: f64,
    pub pixel_delta: u8,
    pub proxy_width: u32,
    pub proxy_height: u32,
    pub max_skip_frames: u32,
}

/// Adaptive quality tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityTuning {
    pub initial: u8,
    pub min: u8,
    pub max: u8,
    pub step: u8,
    pub window: usize,
    pub adjust_interval: u32,
}

/// Real screen geometry used when replaying input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            stream: StreamConfig::default(),
            motion: MotionConfig::default(),
            quality: QualityTuning::default(),
            screen: ScreenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broker_addr: "127.0.0.1".into(),
            tcp_port: 5555,
            udp_port: 5556,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            target_fps: 30,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        let d = MotionGateConfig::default();
        Self {
            threshold_percent: d.threshold_percent,
            pixel_delta: d.pixel_delta,
            proxy_width: d.proxy_width,
            proxy_height: d.proxy_height,
            max_skip_frames: d.max_skip_frames,
        }
    }
}

impl Default for QualityTuning {
    fn default() -> Self {
        let d = QualityConfig::default();
        Self {
            initial: d.initial,
            min: d.min,
            max: d.max,
            step: d.step,
            window: d.window,
            adjust_interval: d.adjust_interval,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading & conversion ─────────────────────────────────────────

impl StreamerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Build the core pipeline configuration.
    pub fn transmitter_config(&self) -> TransmitterConfig {
        TransmitterConfig {
            stream_width: self.stream.width,
            stream_height: self.stream.height,
            target_fps: self.stream.target_fps,
            motion: MotionGateConfig {
                proxy_width: self.motion.proxy_width,
                proxy_height: self.motion.proxy_height,
                pixel_delta: self.motion.pixel_delta,
                threshold_percent: self.motion.threshold_percent,
                max_skip_frames: self.motion.max_skip_frames,
            },
            quality: QualityConfig {
                initial: self.quality.initial,
                min: self.quality.min,
                max: self.quality.max,
                step: self.quality.step,
                target_fps: self.stream.target_fps,
                window: self.quality.window,
                adjust_interval: self.quality.adjust_interval,
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
