//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the broker.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 512 MiB, large enough for media payloads relayed in a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 512 * 1024 * 1024;

/// Root configuration for the relay broker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Relay behaviour: executor endpoint, deadlines, probes, limits.
    pub relay: RelayConfig,

    /// HTTP surface toggles.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path the executor connects to with a WebSocket upgrade.
    pub executor_path: String,

    /// Prefix of HTTP paths relayed to the executor.
    pub route_prefix: String,

    /// Deadline for a relayed request, in seconds.
    pub request_timeout_secs: u64,

    /// Liveness probe period, in seconds.
    pub probe_interval_secs: u64,

    /// Maximum executor message and frame size in bytes.
    pub max_frame_bytes: usize,

    /// Maximum inbound HTTP body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            executor_path: "/ws".to_string(),
            route_prefix: "/v1beta".to_string(),
            request_timeout_secs: 240,
            probe_interval_secs: 30,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_body_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl RelayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Answer CORS preflights and allow any origin.
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { cors_enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive, used when RUST_LOG is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "relay_broker=info,tower_http=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
