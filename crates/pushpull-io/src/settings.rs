//! Runtime settings derived from [`PushPullConfig`]
//!
//! Config files speak milliseconds; components take `Duration`s.

use std::time::Duration;

use pushpull_config::{PushPullConfig, SocketOptionsConfig};
use pushpull_transports::EndpointOptions;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Convert socket options from config into endpoint options
pub fn endpoint_options(socket: &SocketOptionsConfig) -> EndpointOptions {
    EndpointOptions {
        timeout_ms: socket.timeout_ms,
        linger_ms: socket.linger_ms,
        nonblocking: socket.nonblocking,
        ..EndpointOptions::default()
    }
}

/// Receiving pipeline settings
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    pub bind_address: String,
    /// 0 = unbounded
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub enqueue_timeout: Duration,
    pub drain_timeout: Duration,
    pub processing_delay: Duration,
    pub join_timeout: Duration,
    pub endpoint: EndpointOptions,
}

impl ReceiverSettings {
    pub fn from_config(config: &PushPullConfig) -> Self {
        let receiver = &config.receiver;
        Self {
            bind_address: receiver.bind_address(),
            queue_capacity: receiver.queue_capacity,
            poll_interval: ms(receiver.poll_interval_ms),
            enqueue_timeout: ms(receiver.enqueue_timeout_ms),
            drain_timeout: ms(receiver.drain_timeout_ms),
            processing_delay: ms(receiver.processing_delay_ms),
            join_timeout: ms(receiver.join_timeout_ms),
            endpoint: endpoint_options(&config.socket.pull),
        }
    }
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self::from_config(&PushPullConfig::default())
    }
}

/// Sending worker pool settings
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub address: String,
    pub num_workers: usize,
    pub messages_per_worker: u64,
    pub message_delay: Duration,
    /// Per-attempt connect wait and per-send timeout
    pub server_timeout: Duration,
    pub connection_retry_attempts: u32,
    pub connect_retry_delay: Duration,
    /// Total attempts per message
    pub send_retry_attempts: u32,
    pub send_retry_delay: Duration,
    pub max_runtime: Duration,
    pub join_timeout: Duration,
    pub worker_name_prefix: String,
    pub endpoint: EndpointOptions,
}

impl SenderSettings {
    pub fn from_config(config: &PushPullConfig) -> Self {
        let sender = &config.sender;
        Self {
            address: sender.connect_address(),
            num_workers: sender.num_workers,
            messages_per_worker: sender.messages_per_worker,
            message_delay: ms(sender.message_delay_ms),
            server_timeout: ms(sender.server_timeout_ms),
            connection_retry_attempts: sender.connection_retry_attempts,
            connect_retry_delay: ms(sender.connect_retry_delay_ms),
            send_retry_attempts: sender.send_retry_attempts,
            send_retry_delay: ms(sender.send_retry_delay_ms),
            max_runtime: ms(sender.max_runtime_ms),
            join_timeout: ms(sender.join_timeout_ms),
            worker_name_prefix: sender.worker_name_prefix.clone(),
            endpoint: endpoint_options(&config.socket.push),
        }
    }

    /// Upper bound for waiting on the whole pool
    pub fn pool_ceiling(&self) -> Duration {
        self.max_runtime.saturating_add(self.join_timeout)
    }
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self::from_config(&PushPullConfig::default())
    }
}

/// Health monitor settings
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub address: String,
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub failure_threshold: u32,
    pub preflight_check: bool,
    pub preflight_timeout: Duration,
}

impl HealthSettings {
    pub fn from_config(config: &PushPullConfig) -> Self {
        let sender = &config.sender;
        Self {
            address: sender.connect_address(),
            interval: ms(sender.heartbeat_interval_ms),
            probe_timeout: ms(sender.probe_timeout_ms),
            failure_threshold: sender.health_failure_threshold.max(1),
            preflight_check: sender.preflight_check,
            preflight_timeout: ms(sender.server_timeout_ms),
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self::from_config(&PushPullConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let receiver = ReceiverSettings::default();
        assert_eq!(receiver.bind_address, "tcp://*:5560");
        assert_eq!(receiver.poll_interval, Duration::from_millis(100));
        assert_eq!(receiver.endpoint.linger_ms, 1000);
        assert!(receiver.endpoint.nonblocking);

        let sender = SenderSettings::default();
        assert_eq!(sender.address, "tcp://localhost:5560");
        assert_eq!(sender.num_workers, 20);
        assert_eq!(sender.messages_per_worker, 10);
        assert_eq!(sender.server_timeout, Duration::from_secs(3));
        assert_eq!(sender.pool_ceiling(), Duration::from_secs(32));

        let health = HealthSettings::default();
        assert_eq!(health.interval, Duration::from_secs(2));
        assert_eq!(health.probe_timeout, Duration::from_millis(1500));
        assert_eq!(health.failure_threshold, 1);
        assert!(health.preflight_check);
    }
}
