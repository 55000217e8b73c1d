// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output (text or JSON) plus an optional append-only log file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingOptions};

/// Errors raised while configuring logging
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("unknown log format '{0}' (expected 'text' or 'json')")]
    UnknownFormat(String),

    #[error("file logging requested ({0}) but the `file-logging` feature is disabled")]
    FileLoggingDisabled(String),
}

/// Wall-clock timestamps with two decimal digits (centiseconds),
/// e.g. `2025-01-01 12:00:00.42`
#[derive(Debug, Clone, Copy, Default)]
pub struct CentisecondTime;

impl FormatTime for CentisecondTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(
            w,
            "{}.{:02}",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_millis() / 10
        )
    }
}

/// Keeps the non-blocking file writer alive; logs are flushed on drop
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard {
    /// Path of the append log file, if file logging is active
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Build the filter: `RUST_LOG` wins when set, otherwise base level plus debug flags
fn build_filter(debug_flags: &CrateDebugFlags, level: &str) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(debug_flags.to_filter_string(level)),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber
///
/// # Errors
/// Fails if the log file cannot be opened, file logging is requested without
/// the `file-logging` feature, or a global subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = match options.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_timer(CentisecondTime)
            .with_target(options.show_target)
            .with_thread_names(false)
            .with_filter(build_filter(debug_flags, &options.level))
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_timer(CentisecondTime)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(build_filter(debug_flags, &options.level))
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guard = None;

    let log_file = match &options.file {
        None => None,
        #[cfg(feature = "file-logging")]
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            file_guard = Some(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_timer(CentisecondTime)
                .with_ansi(false)
                .with_target(true)
                .with_filter(build_filter(debug_flags, &options.level))
                .boxed();
            layers.push(file_layer);
            Some(path.clone())
        }
        #[cfg(not(feature = "file-logging"))]
        Some(path) => {
            return Err(ObservabilityError::FileLoggingDisabled(path.display().to_string()).into());
        }
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    if let Some(path) = &log_file {
        tracing::info!("File logging enabled: {}", path.display());
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        log_file,
    })
}

/// Initialize console-only logging at `info` with flags from args/env
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(&crate::cli::parse_debug_flags(), &LoggingOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" text ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!(matches!(
            "yaml".parse::<LogFormat>(),
            Err(ObservabilityError::UnknownFormat(_))
        ));
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_file_logging_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("server_logs.txt");
        let options = LoggingOptions {
            file: Some(path.clone()),
            ..LoggingOptions::default()
        };

        let guard = init_logging(&CrateDebugFlags::default(), &options).unwrap();
        assert_eq!(guard.log_file(), Some(path.as_path()));
        tracing::info!("[TEST] hello from the file layer");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("hello from the file layer"));
        assert!(contents.contains("File logging enabled"));

        // A second global subscriber is refused
        assert!(init_logging(&CrateDebugFlags::default(), &LoggingOptions::default()).is_err());
    }
}
