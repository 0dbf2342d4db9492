//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, backpressure, read limits).
    pub listener: ListenerConfig,

    /// Connection-level flood and blacklist thresholds.
    pub connection_guard: ConnectionGuardConfig,

    /// Request-level flood and botnet thresholds.
    pub request_guard: RequestGuardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent connections across all sources (backpressure).
    pub max_connections: usize,

    /// How long to wait for the request bytes before giving up.
    pub read_timeout_secs: u64,

    /// Size of the single request read.
    pub read_buffer_bytes: usize,
}

impl ListenerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
            read_timeout_secs: 10,
            read_buffer_bytes: 1024,
        }
    }
}

/// Thresholds for [`ConnectionGuard`](crate::guard::ConnectionGuard).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionGuardConfig {
    /// Concurrent connections allowed per source (soft cap, no blacklisting).
    pub max_connections_per_source: u32,

    /// Connection starts per rate window before the source is blacklisted.
    pub syn_flood_threshold: u32,

    /// Admission events per rate window before the source is blacklisted.
    pub packet_rate_threshold: u32,

    /// Length of the SYN and packet windows in milliseconds.
    pub rate_window_millis: u64,

    /// How long a blacklisted source is denied.
    pub blacklist_duration_secs: u64,

    /// Records idle longer than this are evicted by the sweep.
    pub idle_timeout_secs: u64,

    pub sweep_interval_secs: u64,

    /// New sources are denied once this many are tracked.
    pub max_tracked_sources: usize,
}

impl ConnectionGuardConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_millis)
    }

    pub fn blacklist_duration(&self) -> Duration {
        Duration::from_secs(self.blacklist_duration_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for ConnectionGuardConfig {
    fn default() -> Self {
        Self {
            max_connections_per_source: 50,
            syn_flood_threshold: 100,
            packet_rate_threshold: 500,
            rate_window_millis: 1000,
            blacklist_duration_secs: 30 * 60,
            idle_timeout_secs: 300,
            sweep_interval_secs: 60,
            max_tracked_sources: 1_000_000,
        }
    }
}

/// Thresholds for [`RequestGuard`](crate::guard::RequestGuard).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestGuardConfig {
    /// Requests per window before the source is treated as flooding.
    pub http_flood_threshold: u32,

    /// Length of the per-source request window.
    pub request_window_secs: u64,

    /// Requests per window that mark sustained botnet-like volume.
    pub botnet_request_threshold: u32,

    /// Distinct user agents one source may present.
    pub max_user_agents_per_source: usize,

    /// Global requests per user-agent string before it is treated as a shared tool signature.
    pub suspicious_user_agent_threshold: u64,

    pub tcp_flood_threshold: u32,

    pub udp_flood_threshold: u32,

    /// Length of the per-source TCP/UDP flood windows.
    pub transport_window_secs: u64,

    /// Records idle longer than this are evicted by the sweep.
    pub idle_timeout_secs: u64,

    pub sweep_interval_secs: u64,

    /// User-agent entries unseen for this long are dropped from the global table.
    pub user_agent_ttl_secs: u64,

    /// Upper bound on the global user-agent table.
    pub max_tracked_user_agents: usize,

    /// New sources are denied once this many are tracked.
    pub max_tracked_sources: usize,
}

impl RequestGuardConfig {
    pub fn request_window(&self) -> Duration {
        Duration::from_secs(self.request_window_secs)
    }

    pub fn transport_window(&self) -> Duration {
        Duration::from_secs(self.transport_window_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn user_agent_ttl(&self) -> Duration {
        Duration::from_secs(self.user_agent_ttl_secs)
    }
}

impl Default for RequestGuardConfig {
    fn default() -> Self {
        Self {
            http_flood_threshold: 200,
            request_window_secs: 60,
            botnet_request_threshold: 1000,
            max_user_agents_per_source: 10,
            suspicious_user_agent_threshold: 100,
            tcp_flood_threshold: 500,
            udp_flood_threshold: 500,
            transport_window_secs: 300,
            idle_timeout_secs: 300,
            sweep_interval_secs: 300,
            user_agent_ttl_secs: 3600,
            max_tracked_user_agents: 100_000,
            max_tracked_sources: 1_000_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily log files. Stdout only when unset.
    pub log_dir: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key; validation refuses to start the admin API with it.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
