//! pushpull-sender: run a pool of PUSH workers against a receiver
//!
//! Flow: preflight probe → health monitor → workers → summary → shutdown.
//! Exits 0 whenever the run ends gracefully, including when the receiver is
//! unreachable; configuration errors exit 1.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use pushpull::config::{load_config, validate_config, PushPullConfig};
use pushpull::io::{
    create_worker_threads, preflight_check, wait_for_threads, HealthMonitor, HealthSettings,
    HeartbeatProbe, PoolReport, SenderSettings, ShutdownContext, ShutdownCoordinator,
    ShutdownReason,
};
use pushpull::observability::{
    debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingOptions,
};
use pushpull::transports::TransportContext;

/// pushpull sender - concurrent task producer
#[derive(Parser, Debug)]
#[command(name = "pushpull-sender", version, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to pushpull.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Receiver host
    #[arg(long)]
    host: Option<String>,

    /// Receiver port
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Messages per worker
    #[arg(short, long)]
    messages: Option<u64>,

    /// Delay between messages of one worker
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Connection attempts per worker
    #[arg(long)]
    retries: Option<u32>,

    /// Health probe interval
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,

    /// Skip the preflight probe
    #[arg(long, default_value_t = false)]
    no_preflight: bool,

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
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        };
        set("sender.host", self.host.clone());
        set("sender.port", self.port.map(|v| v.to_string()));
        set("sender.num_workers", self.workers.map(|v| v.to_string()));
        set("sender.messages_per_worker", self.messages.map(|v| v.to_string()));
        set("sender.message_delay_ms", self.delay_ms.map(|v| v.to_string()));
        set("sender.connection_retry_attempts", self.retries.map(|v| v.to_string()));
        set(
            "sender.heartbeat_interval_ms",
            self.heartbeat_interval_ms.map(|v| v.to_string()),
        );
        set("sender.preflight_check", self.no_preflight.then(|| "false".to_string()));
        set("logging.level", self.log_level.clone());
        set("logging.file", self.log_file.as_ref().map(|p| p.display().to_string()));
        set("logging.format", self.json_logs.then(|| "json".to_string()));
        overrides
    }
}

fn main() -> ExitCode {
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("❌ pushpull-sender: {:#}", e);
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
    info!("🦀 pushpull-sender v{}", pushpull::VERSION);

    let shutdown = ShutdownContext::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            if shutdown.request_stop(ShutdownReason::Interrupt) {
                info!("🛑 Received Ctrl+C, stopping workers...");
            }
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let coordinator = ShutdownCoordinator::new(shutdown.clone(), TransportContext::new()?);
    let settings = SenderSettings::from_config(&config);
    let health = HealthSettings::from_config(&config);

    if health.preflight_check {
        let mut probe = HeartbeatProbe::new(coordinator.context()?, health.address.clone());
        let reachable = preflight_check(&mut probe, health.preflight_timeout);
        drop(probe);
        if reachable.is_err() {
            warn!("⚠ Receiver at {} is not reachable; nothing sent", settings.address);
            coordinator.shutdown(ShutdownReason::ReceiverUnreachable, settings.join_timeout);
            return Ok(ExitCode::SUCCESS);
        }
    }

    let probe = HeartbeatProbe::new(coordinator.context()?, health.address.clone());
    coordinator.register(HealthMonitor::spawn(probe, &shutdown, health)?)?;

    let handles = create_worker_threads(&coordinator.context()?, &settings, &shutdown)?;
    let pool = wait_for_threads(handles, settings.pool_ceiling());
    print_summary(&pool, &settings);

    let report = coordinator.shutdown(ShutdownReason::Completed, settings.join_timeout);
    if !report.is_clean() {
        warn!(
            "⚠ Shutdown incomplete: stragglers={} open_endpoints={} context_error={:?}",
            report.stragglers, report.open_endpoints, report.context_error
        );
    }

    match report.reason {
        ShutdownReason::Fatal(msg) => {
            error!("❌ Sender stopped: {}", msg);
            Ok(ExitCode::FAILURE)
        }
        reason => {
            info!("✅ Sender finished ({})", reason);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summary(pool: &PoolReport, settings: &SenderSettings) {
    let expected = settings.num_workers as u64 * settings.messages_per_worker;
    info!("📊 Sender summary");
    info!("  Messages sent:   {}/{}", pool.messages_sent, expected);
    info!("  Messages failed: {}", pool.messages_failed);
    info!(
        "  Workers:         {} ({} never connected)",
        pool.workers.len(),
        pool.failed_workers
    );
    info!("  Retries:         {}", pool.retry_count);
    if !pool.stragglers.is_empty() {
        warn!("  Stragglers:      {}", pool.stragglers.join(", "));
    }
    for worker in &pool.workers {
        info!(
            "  {} sent={} failed={} last_seq={} connected={}",
            worker.identity,
            worker.messages_sent,
            worker.messages_failed,
            worker.last_sequence_id,
            worker.connected
        );
    }
}
