// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges before any socket is
//! opened. All problems are collected and reported together.

use crate::{ConfigError, ConfigResult, PushPullConfig};

/// Longest accepted duration setting: one day
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    InvalidPortRange { port_name: String, port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPortRange { port_name, port } => {
                write!(
                    f,
                    "Port {} = {} is outside valid range (1024-65535)",
                    port_name, port
                )
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &PushPullConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_port_ranges(config, &mut errors);
    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_port_ranges(config: &PushPullConfig, errors: &mut Vec<ConfigValidationError>) {
    for (port_name, port) in [
        ("receiver.port", config.receiver.port),
        ("sender.port", config.sender.port),
    ] {
        if port < 1024 {
            errors.push(ConfigValidationError::InvalidPortRange {
                port_name: port_name.to_string(),
                port,
            });
        }
    }
}

fn validate_required_fields(config: &PushPullConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.receiver.bind_host.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "receiver.bind_host".to_string(),
        });
    }
    if config.sender.host.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "sender.host".to_string(),
        });
    }
}

fn require_positive(field: &str, value: u64, errors: &mut Vec<ConfigValidationError>) {
    if value == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
}

fn require_at_most(field: &str, value: u64, max: u64, errors: &mut Vec<ConfigValidationError>) {
    if value > max {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be at most {}", max),
        });
    }
}

fn validate_value_ranges(config: &PushPullConfig, errors: &mut Vec<ConfigValidationError>) {
    let sender = &config.sender;
    let receiver = &config.receiver;

    let durations = [
        ("receiver.poll_interval_ms", receiver.poll_interval_ms),
        ("receiver.enqueue_timeout_ms", receiver.enqueue_timeout_ms),
        ("receiver.drain_timeout_ms", receiver.drain_timeout_ms),
        ("receiver.processing_delay_ms", receiver.processing_delay_ms),
        ("receiver.join_timeout_ms", receiver.join_timeout_ms),
        ("sender.message_delay_ms", sender.message_delay_ms),
        ("sender.server_timeout_ms", sender.server_timeout_ms),
        ("sender.connect_retry_delay_ms", sender.connect_retry_delay_ms),
        ("sender.send_retry_delay_ms", sender.send_retry_delay_ms),
        ("sender.heartbeat_interval_ms", sender.heartbeat_interval_ms),
        ("sender.probe_timeout_ms", sender.probe_timeout_ms),
        ("sender.max_runtime_ms", sender.max_runtime_ms),
        ("sender.join_timeout_ms", sender.join_timeout_ms),
        ("socket.pull.timeout_ms", config.socket.pull.timeout_ms),
        ("socket.pull.linger_ms", config.socket.pull.linger_ms),
        ("socket.push.timeout_ms", config.socket.push.timeout_ms),
        ("socket.push.linger_ms", config.socket.push.linger_ms),
    ];
    for (field, value) in durations {
        require_at_most(field, value, MAX_DURATION_MS, errors);
    }

    require_positive("sender.num_workers", sender.num_workers as u64, errors);
    require_positive(
        "sender.connection_retry_attempts",
        sender.connection_retry_attempts as u64,
        errors,
    );
    require_positive("sender.server_timeout_ms", sender.server_timeout_ms, errors);
    require_positive("sender.heartbeat_interval_ms", sender.heartbeat_interval_ms, errors);
    require_positive("sender.probe_timeout_ms", sender.probe_timeout_ms, errors);
    require_positive(
        "sender.health_failure_threshold",
        sender.health_failure_threshold as u64,
        errors,
    );
    require_positive("sender.max_runtime_ms", sender.max_runtime_ms, errors);
    require_positive("receiver.poll_interval_ms", receiver.poll_interval_ms, errors);
    require_positive("socket.push.timeout_ms", config.socket.push.timeout_ms, errors);

    if sender.worker_name_prefix.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "sender.worker_name_prefix".to_string(),
        });
    }

    let format = config.logging.format.to_lowercase();
    if format != "text" && format != "json" {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: "must be 'text' or 'json'".to_string(),
        });
    }
}
