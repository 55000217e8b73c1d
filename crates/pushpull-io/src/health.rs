// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Receiver health monitor
//!
//! Probes the receiver every `interval`. Consecutive failures mark the
//! receiver degraded; reaching the threshold requests a process-wide
//! shutdown with [`ShutdownReason::ReceiverUnreachable`] and ends the
//! monitor. A successful probe clears the degraded flag. Workers are never
//! restarted from here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pushpull_transports::{
    sender_identity, Endpoint, EndpointOptions, EndpointRole, SendOutcome, TransportContext,
    TransportError, TransportResult, WireFrame,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::SenderError;
use crate::settings::HealthSettings;
use crate::shutdown::{ShutdownContext, ShutdownReason};
use crate::task::{JoinOutcome, ManagedThread, ShutdownTask, TaskReport, TaskStatus};

const MONITOR_THREAD: &str = "health-monitor";

/// Checks whether the receiver is reachable
pub trait ReceiverProbe: Send + 'static {
    /// Ok if the receiver answered within `timeout`
    fn probe(&mut self, timeout: Duration) -> TransportResult<()>;
}

/// Probe that connects a fresh PUSH endpoint and sends one heartbeat frame
pub struct HeartbeatProbe {
    context: TransportContext,
    address: String,
    identity: String,
}

impl HeartbeatProbe {
    pub fn new(context: TransportContext, address: impl Into<String>) -> Self {
        Self {
            context,
            address: address.into(),
            identity: sender_identity("Pusher-Health", std::process::id()),
        }
    }
}

impl ReceiverProbe for HeartbeatProbe {
    fn probe(&mut self, timeout: Duration) -> TransportResult<()> {
        let started = Instant::now();
        let options = EndpointOptions::default()
            .with_timeout(timeout)
            .with_no_linger();
        let mut endpoint = Endpoint::create(&self.context, EndpointRole::Push, &self.address, options)?;

        if !endpoint.wait_writable(timeout)? {
            endpoint.close();
            return Err(TransportError::Timeout);
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        let frame = WireFrame::heartbeat(self.identity.as_str()).encode()?;
        let outcome = endpoint.send(&frame, remaining.max(Duration::from_millis(1)))?;
        endpoint.close();

        match outcome {
            SendOutcome::Sent => Ok(()),
            SendOutcome::Timeout | SendOutcome::WouldBlock => Err(TransportError::Timeout),
        }
    }
}

/// Run one probe; a probe slower than `timeout` counts as failed
pub fn probe_once<P: ReceiverProbe + ?Sized>(probe: &mut P, timeout: Duration) -> TransportResult<()> {
    let started = Instant::now();
    probe.probe(timeout)?;
    if started.elapsed() > timeout {
        return Err(TransportError::Timeout);
    }
    Ok(())
}

/// Probe before any worker starts
///
/// # Errors
/// [`SenderError::ReceiverUnreachable`] if the receiver does not answer.
pub fn preflight_check<P: ReceiverProbe + ?Sized>(
    probe: &mut P,
    timeout: Duration,
) -> Result<(), SenderError> {
    info!("[HEALTH] Preflight check (timeout {:?})", timeout);
    match probe_once(probe, timeout) {
        Ok(()) => {
            info!("[HEALTH] ✅ Receiver reachable");
            Ok(())
        }
        Err(e) => {
            error!("[HEALTH] ❌ Receiver not reachable: {}", e);
            Err(SenderError::ReceiverUnreachable(e))
        }
    }
}

#[derive(Debug, Default)]
struct HealthStats {
    probes: AtomicU64,
    failures: AtomicU64,
    triggered_shutdown: AtomicBool,
}

/// Monitor counters at stop time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub probes: u64,
    pub failures: u64,
    pub triggered_shutdown: bool,
}

/// Background receiver health monitor
pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn the monitor thread
    pub fn spawn<P: ReceiverProbe>(
        probe: P,
        shutdown: &Arc<ShutdownContext>,
        settings: HealthSettings,
    ) -> Result<HealthMonitorHandle, SenderError> {
        let stats = Arc::new(HealthStats::default());
        let halt = shutdown.child();

        let thread = {
            let stats = Arc::clone(&stats);
            let root = Arc::clone(shutdown);
            let halt = Arc::clone(&halt);
            ManagedThread::spawn(MONITOR_THREAD, move || {
                run_monitor(probe, root, halt, settings, stats)
            })
            .map_err(|source| SenderError::Spawn {
                name: MONITOR_THREAD.to_string(),
                source,
            })?
        };

        Ok(HealthMonitorHandle {
            thread: Some(thread),
            halt,
            stats,
            report: None,
        })
    }
}

fn run_monitor<P: ReceiverProbe>(
    mut probe: P,
    root: Arc<ShutdownContext>,
    halt: Arc<ShutdownContext>,
    settings: HealthSettings,
    stats: Arc<HealthStats>,
) {
    let threshold = settings.failure_threshold.max(1);
    let mut consecutive = 0u32;
    info!(
        "[HEALTH] Monitor started: every {:?}, probe timeout {:?}, threshold {}",
        settings.interval, settings.probe_timeout, threshold
    );

    while !halt.wait_timeout(settings.interval) {
        stats.probes.fetch_add(1, Ordering::Relaxed);

        match probe_once(&mut probe, settings.probe_timeout) {
            Ok(()) => {
                consecutive = 0;
                if root.set_degraded(false) {
                    info!("[HEALTH] ✅ Receiver is back online");
                } else {
                    debug!("[HEALTH] 💓 Receiver healthy");
                }
            }
            Err(e) => {
                consecutive += 1;
                stats.failures.fetch_add(1, Ordering::Relaxed);
                root.set_degraded(true);
                warn!(
                    "[HEALTH] ⚠ Receiver probe failed ({}/{}): {}",
                    consecutive, threshold, e
                );

                if consecutive >= threshold {
                    error!("[HEALTH] ❌ Receiver unreachable - requesting shutdown");
                    stats.triggered_shutdown.store(true, Ordering::Release);
                    root.request_stop(ShutdownReason::ReceiverUnreachable);
                    break;
                }
            }
        }
    }

    info!("[HEALTH] Monitor stopped");
}

/// Handle to the running monitor
pub struct HealthMonitorHandle {
    thread: Option<ManagedThread<()>>,
    halt: Arc<ShutdownContext>,
    stats: Arc<HealthStats>,
    report: Option<HealthReport>,
}

impl HealthMonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, ManagedThread::is_finished)
    }

    /// Stop the monitor and wait at most `join_timeout`; idempotent
    pub fn stop(&mut self, join_timeout: Duration) -> HealthReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        self.halt.request_stop(ShutdownReason::Completed);
        if let Some(thread) = self.thread.take() {
            match thread.join_timeout(join_timeout) {
                JoinOutcome::Finished(()) => {}
                JoinOutcome::Panicked(msg) => error!("[HEALTH] Monitor panicked: {}", msg),
                JoinOutcome::TimedOut(thread) => {
                    warn!("[HEALTH] Monitor still running after {:?}", join_timeout);
                    self.thread = Some(thread);
                }
            }
        }

        let report = HealthReport {
            probes: self.stats.probes.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            triggered_shutdown: self.stats.triggered_shutdown.load(Ordering::Acquire),
        };
        if self.thread.is_none() {
            self.report = Some(report.clone());
        }
        report
    }
}

impl ShutdownTask for HealthMonitorHandle {
    fn name(&self) -> &str {
        MONITOR_THREAD
    }

    fn join_within(mut self: Box<Self>, timeout: Duration) -> TaskReport {
        let report = self.stop(timeout);
        info!(
            "[HEALTH] probes={} failures={} triggered_shutdown={}",
            report.probes, report.failures, report.triggered_shutdown
        );
        let status = match self.thread.take() {
            Some(thread) => {
                thread.detach();
                TaskStatus::Straggler
            }
            None => TaskStatus::Finished,
        };
        TaskReport {
            name: MONITOR_THREAD.to_string(),
            status,
        }
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.halt.request_stop(ShutdownReason::Completed);
    }
}
