//! Sending worker pool

use std::sync::Arc;
use std::time::{Duration, Instant};

use pushpull_transports::TransportContext;
use serde::Serialize;
use tracing::{error, info, warn};

use super::worker::{Worker, WorkerReport, WorkerStatus};
use crate::error::SenderError;
use crate::settings::SenderSettings;
use crate::shutdown::{ShutdownContext, ShutdownReason};
use crate::task::{JoinOutcome, ManagedThread};

/// Handle to one running worker thread
pub struct WorkerHandle {
    status: Arc<WorkerStatus>,
    thread: ManagedThread<WorkerReport>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        self.status.name()
    }

    /// Live counters of the worker
    pub fn status(&self) -> &WorkerStatus {
        &self.status
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Aggregate outcome of a pool run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
    /// Workers still running at the ceiling (not waited on further)
    pub stragglers: Vec<String>,
    pub panicked: Vec<String>,
    pub messages_sent: u64,
    pub messages_failed: u64,
    /// Workers that never connected
    pub failed_workers: usize,
    pub retry_count: u64,
}

impl PoolReport {
    fn from_workers(workers: Vec<WorkerReport>, stragglers: Vec<String>, panicked: Vec<String>) -> Self {
        Self {
            messages_sent: workers.iter().map(|w| w.messages_sent).sum(),
            messages_failed: workers.iter().map(|w| w.messages_failed).sum(),
            failed_workers: workers.iter().filter(|w| !w.connected).count(),
            retry_count: workers.iter().map(|w| u64::from(w.retry_count)).sum(),
            workers,
            stragglers,
            panicked,
        }
    }
}

/// Spawn exactly `settings.num_workers` named threads (`Pusher-1..N`)
///
/// If a thread cannot be spawned, shutdown is requested, the workers already
/// started are joined within `join_timeout` and the error is returned.
pub fn create_worker_threads(
    context: &TransportContext,
    settings: &SenderSettings,
    shutdown: &Arc<ShutdownContext>,
) -> Result<Vec<WorkerHandle>, SenderError> {
    let settings = Arc::new(settings.clone());
    let mut handles = Vec::with_capacity(settings.num_workers);

    info!(
        "[POOL] 🚀 Starting {} workers x {} messages → {}",
        settings.num_workers, settings.messages_per_worker, settings.address
    );

    for index in 1..=settings.num_workers {
        let worker = Worker::new(
            index,
            Arc::clone(&settings),
            context.clone(),
            Arc::clone(shutdown),
        );
        let name = worker.name().to_string();
        let status = worker.status();

        match ManagedThread::spawn(name.clone(), move || worker.run()) {
            Ok(thread) => handles.push(WorkerHandle { status, thread }),
            Err(source) => {
                error!("[POOL] Failed to spawn {}: {}", name, source);
                shutdown.request_stop(ShutdownReason::Fatal(format!("spawn {}: {}", name, source)));
                wait_for_threads(handles, settings.join_timeout);
                return Err(SenderError::Spawn { name, source });
            }
        }
    }

    Ok(handles)
}

/// Wait for all workers, at most `ceiling` in total
///
/// Never blocks past the ceiling: unfinished workers are reported as
/// stragglers with their last known counters and detached.
pub fn wait_for_threads(handles: Vec<WorkerHandle>, ceiling: Duration) -> PoolReport {
    let deadline = Instant::now().checked_add(ceiling);
    let mut workers = Vec::with_capacity(handles.len());
    let mut stragglers = Vec::new();
    let mut panicked = Vec::new();

    for WorkerHandle { status, thread } in handles {
        let remaining = deadline.map_or(Duration::MAX, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        match thread.join_timeout(remaining) {
            JoinOutcome::Finished(report) => workers.push(report),
            JoinOutcome::Panicked(msg) => {
                error!("[POOL] {} panicked: {}", status.name(), msg);
                panicked.push(status.name().to_string());
                workers.push(status.report());
            }
            JoinOutcome::TimedOut(thread) => {
                warn!("[POOL] {} still running at the {:?} ceiling", status.name(), ceiling);
                stragglers.push(status.name().to_string());
                workers.push(status.report());
                thread.detach();
            }
        }
    }

    let report = PoolReport::from_workers(workers, stragglers, panicked);
    info!(
        "[POOL] Summary: sent={} failed={} failed_workers={} retries={} stragglers={}",
        report.messages_sent,
        report.messages_failed,
        report.failed_workers,
        report.retry_count,
        report.stragglers.len()
    );
    report
}
