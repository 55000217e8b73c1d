// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Managed threads with bounded joins
//!
//! `std::thread::JoinHandle::join` cannot time out. A [`ManagedThread`]
//! signals completion through a condvar from a drop guard (so panics count
//! as completion too) and only calls `join` once the thread is known to be
//! finished. A thread still running at the deadline is handed back to the
//! caller; dropping it detaches the thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Default)]
struct Completion {
    finished: Mutex<bool>,
    cvar: Condvar,
}

impl Completion {
    /// `None` waits until the thread finishes
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut finished = self.finished.lock();
        while !*finished {
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut finished, deadline).timed_out() {
                        return *finished;
                    }
                }
                None => self.cvar.wait(&mut finished),
            }
        }
        true
    }
}

struct CompletionGuard(Arc<Completion>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        *self.0.finished.lock() = true;
        self.0.cvar.notify_all();
    }
}

/// Result of [`ManagedThread::join_timeout`]
pub enum JoinOutcome<T> {
    Finished(T),
    Panicked(String),
    /// Still running at the deadline
    TimedOut(ManagedThread<T>),
}

/// A named OS thread that can be joined with a deadline
pub struct ManagedThread<T> {
    name: String,
    handle: Option<JoinHandle<T>>,
    completion: Arc<Completion>,
}

impl<T: Send + 'static> ManagedThread<T> {
    /// Spawn a named thread
    pub fn spawn<F>(name: impl Into<String>, f: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let completion = Arc::new(Completion::default());
        let guard = CompletionGuard(Arc::clone(&completion));

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let _guard = guard;
            f()
        })?;

        Ok(Self {
            name,
            handle: Some(handle),
            completion,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        *self.completion.finished.lock()
    }

    /// Wait at most `timeout` for the thread to finish
    pub fn join_timeout(mut self, timeout: Duration) -> JoinOutcome<T> {
        if !self.completion.wait_until(Instant::now().checked_add(timeout)) {
            return JoinOutcome::TimedOut(self);
        }

        let Some(handle) = self.handle.take() else {
            return JoinOutcome::Panicked(format!("thread '{}' already joined", self.name));
        };
        match handle.join() {
            Ok(value) => JoinOutcome::Finished(value),
            Err(payload) => JoinOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Detach: the thread keeps running but is no longer tracked
    pub fn detach(mut self) {
        self.handle.take();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// How a task ended during shutdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Finished,
    Panicked(String),
    Straggler,
}

/// Outcome of one task, as recorded in shutdown reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub status: TaskStatus,
}

/// Something the shutdown coordinator can wind down
///
/// Implementors stop on their own once the shared shutdown context leaves
/// `Running`; `join_within` only waits, bounded by `timeout`.
pub trait ShutdownTask: Send {
    fn name(&self) -> &str;

    fn join_within(self: Box<Self>, timeout: Duration) -> TaskReport;
}

impl<T: Send + 'static> ShutdownTask for ManagedThread<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn join_within(self: Box<Self>, timeout: Duration) -> TaskReport {
        let name = self.name.clone();
        let status = match (*self).join_timeout(timeout) {
            JoinOutcome::Finished(_) => TaskStatus::Finished,
            JoinOutcome::Panicked(msg) => {
                error!("[SHUTDOWN] Thread '{}' panicked: {}", name, msg);
                TaskStatus::Panicked(msg)
            }
            JoinOutcome::TimedOut(thread) => {
                warn!("[SHUTDOWN] Thread '{}' still running after {:?}", name, timeout);
                thread.detach();
                TaskStatus::Straggler
            }
        };
        TaskReport { name, status }
    }
}
