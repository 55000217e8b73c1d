//! Config file → runtime settings, as the binaries wire them

use pushpull::config::{load_config, validate_config};
use pushpull::io::{HealthSettings, ReceiverSettings, SenderSettings};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_file_drives_settings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pushpull.toml");
    std::fs::write(
        &path,
        r#"
[receiver]
port = 6100
queue_capacity = 64
drain_timeout_ms = 1500

[sender]
host = "127.0.0.1"
port = 6100
num_workers = 3
messages_per_worker = 7
message_delay_ms = 0
heartbeat_interval_ms = 250
probe_timeout_ms = 200

[socket.push]
linger_ms = 0
"#,
    )
    .unwrap();

    let mut overrides = HashMap::new();
    overrides.insert("sender.num_workers".to_string(), "5".to_string());
    let config = load_config(Some(&path), Some(&overrides)).unwrap();
    validate_config(&config).unwrap();

    let receiver = ReceiverSettings::from_config(&config);
    assert_eq!(receiver.bind_address, "tcp://*:6100");
    assert_eq!(receiver.queue_capacity, 64);
    assert_eq!(receiver.drain_timeout, Duration::from_millis(1500));
    assert!(receiver.endpoint.nonblocking);

    let sender = SenderSettings::from_config(&config);
    assert_eq!(sender.address, "tcp://127.0.0.1:6100");
    assert_eq!(sender.num_workers, 5);
    assert_eq!(sender.messages_per_worker, 7);
    assert!(sender.message_delay.is_zero());
    assert_eq!(sender.endpoint.linger_ms, 0);

    let health = HealthSettings::from_config(&config);
    assert_eq!(health.address, sender.address);
    assert_eq!(health.interval, Duration::from_millis(250));
    assert_eq!(health.probe_timeout, Duration::from_millis(200));
    assert_eq!(health.failure_threshold, 1);
}

#[test]
fn test_invalid_override_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pushpull.toml");
    std::fs::write(&path, "").unwrap();

    let mut overrides = HashMap::new();
    overrides.insert("sender.num_workers".to_string(), "many".to_string());
    assert!(load_config(Some(&path), Some(&overrides)).is_err());
}
