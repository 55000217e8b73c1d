//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = crate::ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(crate::ObservabilityError::UnknownFormat(other.to_string())),
        }
    }
}

/// Options for [`crate::init_logging`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingOptions {
    /// Base level for targets without a debug flag
    pub level: String,
    pub format: LogFormat,
    /// Append-only log file next to console output
    pub file: Option<PathBuf>,
    /// Show the tracing target (module path) in console lines
    pub show_target: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        LoggingOptions {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            show_target: false,
        }
    }
}
