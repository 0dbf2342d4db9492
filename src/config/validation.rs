//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and thresholds > 0, addresses parse)
//! - Refuse to expose the admin API with the placeholder key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GuardConfig, PLACEHOLDER_API_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },

    #[error("admin.api_key must be changed before enabling the admin API")]
    PlaceholderApiKey,
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut positive = |field: &'static str, value: u64| {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    };

    let listener = &config.listener;
    positive("listener.max_connections", listener.max_connections as u64);
    positive("listener.read_timeout_secs", listener.read_timeout_secs);
    positive("listener.read_buffer_bytes", listener.read_buffer_bytes as u64);

    let conn = &config.connection_guard;
    positive("connection_guard.max_connections_per_source", conn.max_connections_per_source.into());
    positive("connection_guard.syn_flood_threshold", conn.syn_flood_threshold.into());
    positive("connection_guard.packet_rate_threshold", conn.packet_rate_threshold.into());
    positive("connection_guard.rate_window_millis", conn.rate_window_millis);
    positive("connection_guard.blacklist_duration_secs", conn.blacklist_duration_secs);
    positive("connection_guard.idle_timeout_secs", conn.idle_timeout_secs);
    positive("connection_guard.sweep_interval_secs", conn.sweep_interval_secs);
    positive("connection_guard.max_tracked_sources", conn.max_tracked_sources as u64);

    let req = &config.request_guard;
    positive("request_guard.http_flood_threshold", req.http_flood_threshold.into());
    positive("request_guard.request_window_secs", req.request_window_secs);
    positive("request_guard.botnet_request_threshold", req.botnet_request_threshold.into());
    positive("request_guard.max_user_agents_per_source", req.max_user_agents_per_source as u64);
    positive("request_guard.suspicious_user_agent_threshold", req.suspicious_user_agent_threshold);
    positive("request_guard.tcp_flood_threshold", req.tcp_flood_threshold.into());
    positive("request_guard.udp_flood_threshold", req.udp_flood_threshold.into());
    positive("request_guard.transport_window_secs", req.transport_window_secs);
    positive("request_guard.idle_timeout_secs", req.idle_timeout_secs);
    positive("request_guard.sweep_interval_secs", req.sweep_interval_secs);
    positive("request_guard.user_agent_ttl_secs", req.user_agent_ttl_secs);
    positive("request_guard.max_tracked_user_agents", req.max_tracked_user_agents as u64);
    positive("request_guard.max_tracked_sources", req.max_tracked_sources as u64);

    check_address(&mut errors, "listener.bind_address", &listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::PlaceholderApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GuardConfig::default();
        config.connection_guard.syn_flood_threshold = 0;
        config.request_guard.sweep_interval_secs = 0;
        config.listener.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero {
            field: "connection_guard.syn_flood_threshold"
        }));
    }

    #[test]
    fn admin_requires_real_key() {
        let mut config = GuardConfig::default();
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::PlaceholderApiKey])
        );

        config.admin.api_key = "s3cret".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
