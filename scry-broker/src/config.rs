//! Broker configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address both listeners bind to.
    pub bind_addr: String,
    /// TCP control port.
    pub tcp_port: u16,
    /// UDP frame/registration port.
    pub udp_port: u16,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            tcp_port: 5555,
            udp_port: 5556,
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

// ── Loading ──────────────────────────────────────────────────────

impl BrokerConfig {
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
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = BrokerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("tcp_port"));
        assert!(text.contains("udp_port"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = BrokerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BrokerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.tcp_port, 5555);
        assert_eq!(parsed.network.udp_port, 5556);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: BrokerConfig = toml::from_str("[network]\ntcp_port = 7000\n").unwrap();
        assert_eq!(parsed.network.tcp_port, 7000);
        assert_eq!(parsed.network.udp_port, 5556);
        assert_eq!(parsed.logging.level, "info");
    }
}
