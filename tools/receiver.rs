//! pushpull-receiver: bind a PULL endpoint and process tasks until Ctrl+C
//!
//! Exit codes: 0 after a graceful shutdown, 1 on configuration errors, bind
//! failure or an unusable endpoint.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use pushpull::config::{load_config, validate_config, PushPullConfig};
use pushpull::io::{
    LoggingHandler, ReceiverPipeline, ReceiverSettings, ShutdownContext, ShutdownCoordinator,
    ShutdownReason,
};
use pushpull::observability::{
    debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingOptions,
};
use pushpull::transports::TransportContext;

/// pushpull receiver - load-balanced task sink
#[derive(Parser, Debug)]
#[command(name = "pushpull-receiver", version, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to pushpull.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind (`*` for all)
    #[arg(long)]
    bind_host: Option<String>,

    /// Internal queue capacity (0 = unbounded)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Simulated processing time per message
    #[arg(long)]
    processing_delay_ms: Option<u64>,

    /// Append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// JSON console logs
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(port) = self.port {
            overrides.insert("receiver.port".to_string(), port.to_string());
        }
        if let Some(host) = &self.bind_host {
            overrides.insert("receiver.bind_host".to_string(), host.clone());
        }
        if let Some(capacity) = self.queue_capacity {
            overrides.insert("receiver.queue_capacity".to_string(), capacity.to_string());
        }
        if let Some(delay) = self.processing_delay_ms {
            overrides.insert("receiver.processing_delay_ms".to_string(), delay.to_string());
        }
        if let Some(level) = &self.log_level {
            overrides.insert("logging.level".to_string(), level.clone());
        }
        if let Some(path) = &self.log_file {
            overrides.insert("logging.file".to_string(), path.display().to_string());
        }
        if self.json_logs {
            overrides.insert("logging.format".to_string(), "json".to_string());
        }
        overrides
    }
}

fn main() -> ExitCode {
    // --debug-<crate> flags are handled by the observability crate
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("❌ pushpull-receiver: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn logging_options(config: &PushPullConfig) -> Result<LoggingOptions> {
    Ok(LoggingOptions {
        level: config.logging.level.clone(),
        format: LogFormat::from_str(&config.logging.format)?,
        file: config.logging.file.clone(),
        ..LoggingOptions::default()
    })
}

fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;
    validate_config(&config).context("Invalid configuration")?;

    let _logging = init_logging(&parse_debug_flags(), &logging_options(&config)?)?;
    info!("🦀 pushpull-receiver v{}", pushpull::VERSION);

    let shutdown = ShutdownContext::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            if shutdown.request_stop(ShutdownReason::Interrupt) {
                info!("🛑 Received Ctrl+C, shutting down gracefully...");
            }
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let coordinator = ShutdownCoordinator::new(shutdown.clone(), TransportContext::new()?);
    let settings = ReceiverSettings::from_config(&config);
    let join_timeout = settings.join_timeout;
    let processing_delay = settings.processing_delay;

    let mut pipeline = ReceiverPipeline::new(&coordinator.context()?, settings, &shutdown);
    if let Err(e) = pipeline.bind() {
        drop(pipeline);
        coordinator.shutdown(ShutdownReason::Fatal(e.to_string()), join_timeout);
        return Err(e).context("Receiver cannot start");
    }
    pipeline.start(LoggingHandler::new(processing_delay))?;

    let stats = pipeline.stats();
    coordinator.register(pipeline)?;
    info!("✅ Receiver ready (Press Ctrl+C to stop)");

    while !shutdown.wait_timeout(Duration::from_secs(10)) {
        debug!(
            "[RECEIVER] received={} processed={} heartbeats={}",
            stats.received(),
            stats.processed(),
            stats.heartbeats()
        );
    }

    let report = coordinator.shutdown(ShutdownReason::Interrupt, join_timeout);
    if !report.is_clean() {
        warn!(
            "⚠ Shutdown incomplete: stragglers={} open_endpoints={} context_error={:?}",
            report.stragglers, report.open_endpoints, report.context_error
        );
    }

    match report.reason {
        ShutdownReason::Fatal(msg) => {
            error!("❌ Receiver stopped: {}", msg);
            Ok(ExitCode::FAILURE)
        }
        _ => {
            info!("✅ Receiver shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}
