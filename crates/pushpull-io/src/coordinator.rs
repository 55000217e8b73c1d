// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Process shutdown coordinator
//!
//! Owns the transport context and the registered background tasks. A
//! shutdown runs in a fixed order: request stop, join every task within its
//! own timeout, verify no endpoint is open, terminate the context, mark the
//! process stopped. Only the first call does the work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pushpull_transports::{TransportContext, TransportError};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::CoordinatorError;
use crate::shutdown::{ShutdownContext, ShutdownReason};
use crate::task::{ShutdownTask, TaskReport, TaskStatus};

/// What happened during shutdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    pub tasks: Vec<TaskReport>,
    pub stragglers: usize,
    /// Endpoints still registered after the tasks were joined
    pub open_endpoints: usize,
    pub context_terminated: bool,
    pub context_error: Option<String>,
    pub elapsed_ms: u64,
}

impl ShutdownReport {
    /// True when every task finished and the context was torn down
    pub fn is_clean(&self) -> bool {
        self.stragglers == 0
            && self.context_terminated
            && self
                .tasks
                .iter()
                .all(|t| t.status == TaskStatus::Finished)
    }
}

struct CoordinatorState {
    context: Option<TransportContext>,
    tasks: Vec<Box<dyn ShutdownTask>>,
    report: Option<ShutdownReport>,
}

pub struct ShutdownCoordinator {
    shutdown: Arc<ShutdownContext>,
    state: Mutex<CoordinatorState>,
}

impl ShutdownCoordinator {
    /// Takes the only long-lived handle to `context`; clones handed to
    /// threads must be dropped by the time [`Self::shutdown`] runs.
    pub fn new(shutdown: Arc<ShutdownContext>, context: TransportContext) -> Self {
        Self {
            shutdown,
            state: Mutex::new(CoordinatorState {
                context: Some(context),
                tasks: Vec::new(),
                report: None,
            }),
        }
    }

    pub fn shutdown_context(&self) -> &Arc<ShutdownContext> {
        &self.shutdown
    }

    /// Clone of the transport context for endpoint owners
    pub fn context(&self) -> Result<TransportContext, CoordinatorError> {
        self.state
            .lock()
            .context
            .clone()
            .ok_or(CoordinatorError::AlreadyShutDown)
    }

    /// Register a task to join during shutdown
    pub fn register(&self, task: impl ShutdownTask + 'static) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        if state.report.is_some() {
            return Err(CoordinatorError::AlreadyShutDown);
        }
        info!("[SHUTDOWN] Registered task '{}'", task.name());
        state.tasks.push(Box::new(task));
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().report.is_some()
    }

    /// Run the shutdown sequence once; later calls return the first report
    pub fn shutdown(&self, reason: ShutdownReason, join_timeout: Duration) -> ShutdownReport {
        let mut state = self.state.lock();
        if let Some(report) = &state.report {
            return report.clone();
        }

        let started = Instant::now();
        self.shutdown.request_stop(reason);
        // The first requester's reason wins
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Completed);
        info!("[SHUTDOWN] Shutting down ({}), {} tasks", reason, state.tasks.len());

        let tasks: Vec<TaskReport> = state
            .tasks
            .drain(..)
            .map(|task| {
                let report = task.join_within(join_timeout);
                match &report.status {
                    TaskStatus::Finished => info!("[SHUTDOWN] ✅ '{}' finished", report.name),
                    TaskStatus::Panicked(msg) => {
                        error!("[SHUTDOWN] ❌ '{}' panicked: {}", report.name, msg)
                    }
                    TaskStatus::Straggler => {
                        warn!("[SHUTDOWN] ⚠ '{}' did not stop within {:?}", report.name, join_timeout)
                    }
                }
                report
            })
            .collect();
        let stragglers = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Straggler)
            .count();

        let (open_endpoints, context_terminated, context_error) = match state.context.take() {
            Some(context) => {
                let open = context.registry().open_count();
                match context.terminate() {
                    Ok(()) => (open, true, None),
                    Err(e) => {
                        // Stragglers may still hold sockets; leave the context to them
                        warn!("[SHUTDOWN] ⚠ Transport context not terminated: {}", e);
                        (open, false, Some(describe(&e)))
                    }
                }
            }
            None => (0, false, Some("transport context already released".to_string())),
        };

        self.shutdown.mark_stopped();

        let report = ShutdownReport {
            reason,
            tasks,
            stragglers,
            open_endpoints,
            context_terminated,
            context_error,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "[SHUTDOWN] Complete in {}ms: stragglers={} open_endpoints={} context_terminated={}",
            report.elapsed_ms, report.stragglers, report.open_endpoints, report.context_terminated
        );
        state.report = Some(report.clone());
        report
    }
}

fn describe(error: &TransportError) -> String {
    match error {
        TransportError::EndpointsStillOpen(n) => format!("{} endpoints still open", n),
        TransportError::ContextInUse => "context still referenced".to_string(),
        other => other.to_string(),
    }
}
