//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the tunneling gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, upgrade path).
    pub listener: ListenerConfig,

    /// Per-session timeouts and keepalive.
    pub session: SessionConfig,

    /// Source admission control.
    pub admission: AdmissionConfig,

    /// Destination policy.
    pub destination: DestinationConfig,

    /// Per-session throughput quota.
    pub throttle: ThrottleConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Static front-end assets.
    #[serde(rename = "static")]
    pub static_files: StaticConfig,

    /// Shutdown drain settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5555").
    pub bind_address: String,

    /// Path of the WebSocket upgrade endpoint.
    pub ws_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5555".to_string(),
            ws_path: "/ws".to_string(),
        }
    }
}

/// Timeouts applied while negotiating and running a session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for the first control message after upgrade, in milliseconds.
    pub handshake_timeout_ms: u64,

    /// Deadline for the outbound TCP dial, in seconds.
    pub dial_timeout_secs: u64,

    /// Interval between protocol-level pings, in seconds.
    pub keepalive_interval_secs: u64,

    /// Largest accepted control message, in bytes.
    pub max_control_message_bytes: usize,
}

impl SessionConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 2_000,
            dial_timeout_secs: 30,
            keepalive_interval_secs: 20,
            max_control_message_bytes: 2048,
        }
    }
}

/// Source admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Source address prefixes that are always rejected.
    pub blacklisted_sources: Vec<String>,

    /// Connection attempts per second allowed for one source.
    pub source_rate_per_sec: f64,

    /// Burst size of the per-source bucket.
    pub source_burst: u32,

    /// Maximum number of sources tracked before least-recently-seen eviction.
    pub max_tracked_sources: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            blacklisted_sources: Vec::new(),
            source_rate_per_sec: 1.0,
            source_burst: 1,
            max_tracked_sources: 10_000,
        }
    }
}

/// Destination policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Target hosts rejected by exact string match.
    pub blacklisted_hosts: Vec<String>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            blacklisted_hosts: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "::1".to_string(),
            ],
        }
    }
}

/// Throughput quota shared by the two directions of one session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Bytes a single writer may send before the quota is consulted.
    pub free_bytes: u64,

    /// Refill rate of the shared bucket in bytes per second.
    pub rate_bytes_per_sec: u64,

    /// Capacity of the shared bucket in bytes.
    pub burst_bytes: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            free_bytes: 1024 * 1024 * 1024,
            rate_bytes_per_sec: 100 * 1024,
            burst_bytes: 64 * 1024,
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only audit file. `None` disables auditing.
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("connections.log")),
        }
    }
}

/// Static asset serving.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Directory holding the front-end. `None` disables the route.
    pub dir: Option<PathBuf>,

    /// Mount point of the front-end.
    pub mount: String,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            dir: None,
            mount: "/cl".to_string(),
        }
    }
}

/// Shutdown drain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Poll interval of the drain loop, in milliseconds.
    pub drain_poll_ms: u64,

    /// Log drain progress every this many polls.
    pub progress_every: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_poll_ms: 300,
            progress_every: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Emit per-session debug logs.
    pub debug: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
