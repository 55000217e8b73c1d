// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! # pushpull configuration
//!
//! Type-safe configuration loader for the receiver and sender processes:
//! - TOML file parsing (`pushpull.toml`)
//! - Environment variable overrides (`PUSHPULL_*`)
//! - CLI argument overrides (dotted keys, e.g. `sender.num_workers`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pushpull_config::{load_config, validate_config};
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//!
//! println!("Receiver port: {}", config.receiver.port);
//! println!("Workers: {}", config.sender.num_workers);
//! # Ok::<(), pushpull_config::ConfigError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name searched by [`find_config_file`]
pub const CONFIG_FILE_NAME: &str = "pushpull.toml";

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown override key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
