// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, PushPullConfig, CONFIG_FILE_NAME};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Find the configuration file
///
/// Search order:
/// 1. `PUSHPULL_CONFIG_PATH` environment variable
/// 2. Current working directory: `./pushpull.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("PUSHPULL_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by PUSHPULL_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet PUSHPULL_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// * `config_path` - Explicit path. If `None`, the file is searched for; when no
///   file exists anywhere the built-in defaults are used.
/// * `cli_args` - Optional dotted-key overrides (`receiver.port` → `"5561"`)
///
/// # Errors
///
/// Returns an error if an explicit file is missing, contains invalid TOML,
/// or an override key/value is invalid
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<PushPullConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::FileNotFound(_)) if env::var("PUSHPULL_CONFIG_PATH").is_err() => None,
            Err(e) => return Err(e),
        },
    };

    let mut config = match config_file {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => PushPullConfig::default(),
    };

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PUSHPULL_PORT` -> `receiver.port` and `sender.port`
/// - `PUSHPULL_BIND_HOST` -> `receiver.bind_host`
/// - `PUSHPULL_HOST` -> `sender.host`
/// - `PUSHPULL_NUM_WORKERS` -> `sender.num_workers`
/// - `PUSHPULL_MESSAGES_PER_WORKER` -> `sender.messages_per_worker`
/// - `PUSHPULL_MESSAGE_DELAY_MS` -> `sender.message_delay_ms`
/// - `PUSHPULL_SERVER_TIMEOUT_MS` -> `sender.server_timeout_ms`
/// - `PUSHPULL_CONNECTION_RETRY_ATTEMPTS` -> `sender.connection_retry_attempts`
/// - `PUSHPULL_HEARTBEAT_INTERVAL_MS` -> `sender.heartbeat_interval_ms`
/// - `PUSHPULL_PREFLIGHT_CHECK` -> `sender.preflight_check`
/// - `PUSHPULL_LOG_LEVEL` -> `logging.level`
/// - `PUSHPULL_LOG_FORMAT` -> `logging.format`
/// - `PUSHPULL_LOG_FILE` -> `logging.file`
///
/// Unparseable values are ignored.
pub fn apply_environment_overrides(config: &mut PushPullConfig) {
    if let Some(port) = env_parse::<u16>("PUSHPULL_PORT") {
        config.receiver.port = port;
        config.sender.port = port;
    }
    if let Ok(value) = env::var("PUSHPULL_BIND_HOST") {
        config.receiver.bind_host = value;
    }
    if let Ok(value) = env::var("PUSHPULL_HOST") {
        config.sender.host = value;
    }
    if let Some(workers) = env_parse("PUSHPULL_NUM_WORKERS") {
        config.sender.num_workers = workers;
    }
    if let Some(messages) = env_parse("PUSHPULL_MESSAGES_PER_WORKER") {
        config.sender.messages_per_worker = messages;
    }
    if let Some(delay) = env_parse("PUSHPULL_MESSAGE_DELAY_MS") {
        config.sender.message_delay_ms = delay;
    }
    if let Some(timeout) = env_parse("PUSHPULL_SERVER_TIMEOUT_MS") {
        config.sender.server_timeout_ms = timeout;
    }
    if let Some(attempts) = env_parse("PUSHPULL_CONNECTION_RETRY_ATTEMPTS") {
        config.sender.connection_retry_attempts = attempts;
    }
    if let Some(interval) = env_parse("PUSHPULL_HEARTBEAT_INTERVAL_MS") {
        config.sender.heartbeat_interval_ms = interval;
    }
    if let Some(preflight) = env::var("PUSHPULL_PREFLIGHT_CHECK")
        .ok()
        .and_then(|v| parse_bool(&v))
    {
        config.sender.preflight_check = preflight;
    }
    if let Ok(value) = env::var("PUSHPULL_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("PUSHPULL_LOG_FORMAT") {
        config.logging.format = value;
    }
    if let Ok(value) = env::var("PUSHPULL_LOG_FILE") {
        config.logging.file = Some(PathBuf::from(value));
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = {:?}", key, value)))
}

/// Apply CLI argument overrides to configuration
///
/// Keys are dotted paths into the configuration, e.g.
/// `{"sender.num_workers": "4", "receiver.port": "6000"}`.
///
/// # Errors
///
/// Unlike environment overrides, an unknown key or unparseable value is an error:
/// CLI arguments are explicit user intent.
pub fn apply_cli_overrides(
    config: &mut PushPullConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in cli_args {
        match key.as_str() {
            "receiver.bind_host" => config.receiver.bind_host = value.clone(),
            "receiver.port" => config.receiver.port = parse_value(key, value)?,
            "receiver.queue_capacity" => config.receiver.queue_capacity = parse_value(key, value)?,
            "receiver.poll_interval_ms" => {
                config.receiver.poll_interval_ms = parse_value(key, value)?
            }
            "receiver.drain_timeout_ms" => {
                config.receiver.drain_timeout_ms = parse_value(key, value)?
            }
            "receiver.processing_delay_ms" => {
                config.receiver.processing_delay_ms = parse_value(key, value)?
            }
            "sender.host" => config.sender.host = value.clone(),
            "sender.port" => config.sender.port = parse_value(key, value)?,
            "sender.num_workers" => config.sender.num_workers = parse_value(key, value)?,
            "sender.messages_per_worker" => {
                config.sender.messages_per_worker = parse_value(key, value)?
            }
            "sender.message_delay_ms" => config.sender.message_delay_ms = parse_value(key, value)?,
            "sender.server_timeout_ms" => {
                config.sender.server_timeout_ms = parse_value(key, value)?
            }
            "sender.connection_retry_attempts" => {
                config.sender.connection_retry_attempts = parse_value(key, value)?
            }
            "sender.heartbeat_interval_ms" => {
                config.sender.heartbeat_interval_ms = parse_value(key, value)?
            }
            "sender.health_failure_threshold" => {
                config.sender.health_failure_threshold = parse_value(key, value)?
            }
            "sender.preflight_check" => {
                config.sender.preflight_check = parse_bool(value)
                    .ok_or_else(|| ConfigError::InvalidValue(format!("{} = {:?}", key, value)))?
            }
            "logging.level" => config.logging.level = value.clone(),
            "logging.format" => config.logging.format = value.clone(),
            "logging.file" => config.logging.file = Some(PathBuf::from(value)),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("PUSHPULL_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("PUSHPULL_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("PUSHPULL_CONFIG_PATH", "/definitely/not/here/pushpull.toml");
        let result = load_config(None, None);
        env::remove_var("PUSHPULL_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[receiver]").unwrap();
        writeln!(file, "port = 6001").unwrap();
        writeln!(file, "[sender]").unwrap();
        writeln!(file, "num_workers = 3").unwrap();
        writeln!(file, "[socket.push]").unwrap();
        writeln!(file, "linger_ms = 0").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.receiver.port, 6001);
        assert_eq!(config.sender.num_workers, 3);
        assert_eq!(config.socket.push.linger_ms, 0);
        // untouched fields keep their defaults
        assert_eq!(config.sender.messages_per_worker, 10);
        assert_eq!(config.socket.pull.timeout_ms, 100);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[receiver\nport = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = PushPullConfig::default();

        env::set_var("PUSHPULL_PORT", "7100");
        env::set_var("PUSHPULL_NUM_WORKERS", "5");
        env::set_var("PUSHPULL_PREFLIGHT_CHECK", "no");
        env::set_var("PUSHPULL_MESSAGE_DELAY_MS", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("PUSHPULL_PORT");
        env::remove_var("PUSHPULL_NUM_WORKERS");
        env::remove_var("PUSHPULL_PREFLIGHT_CHECK");
        env::remove_var("PUSHPULL_MESSAGE_DELAY_MS");

        assert_eq!(config.receiver.port, 7100);
        assert_eq!(config.sender.port, 7100);
        assert_eq!(config.sender.num_workers, 5);
        assert!(!config.sender.preflight_check);
        assert_eq!(config.sender.message_delay_ms, 500);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = PushPullConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("sender.host".to_string(), "10.0.0.1".to_string());
        cli_args.insert("sender.messages_per_worker".to_string(), "5".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.sender.host, "10.0.0.1");
        assert_eq!(config.sender.messages_per_worker, 5);
    }

    #[test]
    fn test_cli_rejects_unknown_key_and_bad_value() {
        let mut config = PushPullConfig::default();

        let mut unknown = HashMap::new();
        unknown.insert("sender.colour".to_string(), "blue".to_string());
        assert!(matches!(
            apply_cli_overrides(&mut config, &unknown),
            Err(ConfigError::UnknownKey(_))
        ));

        let mut bad = HashMap::new();
        bad.insert("receiver.port".to_string(), "seventy".to_string());
        assert!(matches!(
            apply_cli_overrides(&mut config, &bad),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[sender]").unwrap();
        writeln!(file, "host = \"file-host\"").unwrap();
        writeln!(file, "num_workers = 2").unwrap();

        env::set_var("PUSHPULL_HOST", "env-host");
        env::set_var("PUSHPULL_NUM_WORKERS", "4");

        let mut cli_args = HashMap::new();
        cli_args.insert("sender.host".to_string(), "cli-host".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("PUSHPULL_HOST");
        env::remove_var("PUSHPULL_NUM_WORKERS");

        // CLI wins for host, env wins for workers (no CLI override)
        assert_eq!(config.sender.host, "cli-host");
        assert_eq!(config.sender.num_workers, 4);
    }
}
