// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `pushpull.toml`. Durations are expressed in milliseconds.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PushPullConfig {
    pub receiver: ReceiverConfig,
    pub sender: SenderConfig,
    pub socket: SocketConfig,
    pub logging: LoggingConfig,
}

/// PULL side: bind address, queue and drain behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Interface to bind, `*` for all interfaces
    pub bind_host: String,
    pub port: u16,
    /// Internal queue capacity (0 = unbounded)
    pub queue_capacity: usize,
    /// Bounded wait used by the intake and processor loops
    pub poll_interval_ms: u64,
    /// How long a full queue may block intake before the message is dropped
    pub enqueue_timeout_ms: u64,
    /// Grace period for the processor to empty the queue after shutdown
    pub drain_timeout_ms: u64,
    /// Simulated per-message processing time of the default handler
    pub processing_delay_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_host: "*".to_string(),
            port: 5560,
            queue_capacity: 0,
            poll_interval_ms: 100,
            enqueue_timeout_ms: 100,
            drain_timeout_ms: 3000,
            processing_delay_ms: 100,
            join_timeout_ms: 3000,
        }
    }
}

impl ReceiverConfig {
    /// ZMQ bind endpoint, e.g. `tcp://*:5560`
    pub fn bind_address(&self) -> String {
        format!("tcp://{}:{}", self.bind_host, self.port)
    }
}

/// PUSH side: worker pool, retry and health monitoring tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SenderConfig {
    pub host: String,
    pub port: u16,
    pub num_workers: usize,
    pub messages_per_worker: u64,
    pub message_delay_ms: u64,
    /// Per connect attempt wait for the receiver
    pub server_timeout_ms: u64,
    pub connection_retry_attempts: u32,
    pub connect_retry_delay_ms: u64,
    pub send_retry_attempts: u32,
    pub send_retry_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Consecutive failed probes before shutdown is raised
    pub health_failure_threshold: u32,
    /// Per-worker runtime ceiling
    pub max_runtime_ms: u64,
    pub join_timeout_ms: u64,
    /// Probe the receiver once before any worker starts
    pub preflight_check: bool,
    pub worker_name_prefix: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5560,
            num_workers: 20,
            messages_per_worker: 10,
            message_delay_ms: 500,
            server_timeout_ms: 3000,
            connection_retry_attempts: 2,
            connect_retry_delay_ms: 1000,
            send_retry_attempts: 2,
            send_retry_delay_ms: 500,
            heartbeat_interval_ms: 2000,
            probe_timeout_ms: 1500,
            health_failure_threshold: 1,
            max_runtime_ms: 30_000,
            join_timeout_ms: 2000,
            preflight_check: true,
            worker_name_prefix: "Pusher".to_string(),
        }
    }
}

impl SenderConfig {
    /// ZMQ connect endpoint, e.g. `tcp://localhost:5560`
    pub fn connect_address(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Socket options for both roles
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    pub pull: SocketOptionsConfig,
    pub push: SocketOptionsConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            pull: SocketOptionsConfig {
                timeout_ms: 100,
                linger_ms: 1000,
                nonblocking: true,
            },
            push: SocketOptionsConfig {
                timeout_ms: 3000,
                linger_ms: 100,
                nonblocking: false,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketOptionsConfig {
    /// Max wait per send/receive operation
    pub timeout_ms: u64,
    /// Drain grace period on close
    pub linger_ms: u64,
    /// Receive returns immediately when nothing is queued
    pub nonblocking: bool,
}

impl Default for SocketOptionsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            linger_ms: 1000,
            nonblocking: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level when no debug flags are given (trace, debug, info, warn, error)
    pub level: String,
    /// `text` or `json`
    pub format: String,
    /// Append log lines to this file in addition to the console
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}
