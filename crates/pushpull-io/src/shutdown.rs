// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide shutdown state
//!
//! `Running → Stopping → Stopped`, never backwards. Every blocking wait in
//! the crate goes through [`ShutdownContext::wait_timeout`] so a stop request
//! wakes it immediately.
//!
//! Child contexts stop when their parent stops, but can also be stopped on
//! their own. Components use a child to wind down one subsystem without
//! raising a process-wide shutdown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum ShutdownPhase {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl ShutdownPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Stopping,
            _ => ShutdownPhase::Stopped,
        }
    }
}

/// Why shutdown was requested; only the first reason is kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShutdownReason {
    /// Ctrl-C / SIGTERM
    Interrupt,
    /// Health monitor could not reach the receiver
    ReceiverUnreachable,
    /// All work finished
    Completed,
    /// Unrecoverable error
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::ReceiverUnreachable => write!(f, "receiver unreachable"),
            ShutdownReason::Completed => write!(f, "completed"),
            ShutdownReason::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

/// Shared shutdown state, passed around as `Arc<ShutdownContext>`
pub struct ShutdownContext {
    phase: AtomicU8,
    reason: Mutex<Option<ShutdownReason>>,
    degraded: AtomicBool,
    wait_lock: Mutex<()>,
    wake: Condvar,
    children: Mutex<Vec<Weak<ShutdownContext>>>,
}

impl ShutdownContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            reason: Mutex::new(None),
            degraded: AtomicBool::new(false),
            wait_lock: Mutex::new(()),
            wake: Condvar::new(),
            children: Mutex::new(Vec::new()),
        })
    }

    /// Create a child that stops together with `self`
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        let child = Self::new();
        {
            let mut children = self.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // A stop racing with registration is caught here
        if self.is_stopping() {
            let reason = self.reason().unwrap_or(ShutdownReason::Completed);
            child.request_stop(reason);
        }
        child
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.phase() == ShutdownPhase::Running
    }

    /// True once stop was requested (Stopping or Stopped)
    pub fn is_stopping(&self) -> bool {
        self.phase() >= ShutdownPhase::Stopping
    }

    /// First recorded reason, if any
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().clone()
    }

    /// Request shutdown
    ///
    /// Returns true if this call moved the phase from Running to Stopping.
    /// Later calls keep the first reason.
    pub fn request_stop(&self, reason: ShutdownReason) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason.clone());
            }
        }

        let transitioned = self
            .phase
            .compare_exchange(
                ShutdownPhase::Running as u8,
                ShutdownPhase::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        self.notify_waiters();

        if transitioned {
            let children: Vec<_> = self.children.lock().iter().filter_map(Weak::upgrade).collect();
            for child in children {
                child.request_stop(reason.clone());
            }
        }
        transitioned
    }

    /// Final phase; implies Stopping
    pub fn mark_stopped(&self) {
        if self.is_running() {
            self.request_stop(ShutdownReason::Completed);
        }
        self.phase.fetch_max(ShutdownPhase::Stopped as u8, Ordering::AcqRel);
        self.notify_waiters();
    }

    fn notify_waiters(&self) {
        let _guard = self.wait_lock.lock();
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`, waking early when stop is requested
    ///
    /// Returns true if stop has been requested.
    /// A timeout too large to represent waits until stop is requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.wait_lock.lock();
        while !self.is_stopping() {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut guard, deadline).timed_out() {
                        return self.is_stopping();
                    }
                }
                None => self.wake.wait(&mut guard),
            }
        }
        true
    }

    /// Set receiver availability; returns the previous value
    pub fn set_degraded(&self, degraded: bool) -> bool {
        self.degraded.swap(degraded, Ordering::AcqRel)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ShutdownContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownContext")
            .field("phase", &self.phase())
            .field("reason", &self.reason())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_phase_is_monotonic_and_first_reason_wins() {
        let shutdown = ShutdownContext::new();
        assert!(shutdown.is_running());
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.request_stop(ShutdownReason::Interrupt));
        assert!(!shutdown.request_stop(ShutdownReason::Completed));
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopping);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Interrupt));

        shutdown.mark_stopped();
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
        assert!(!shutdown.request_stop(ShutdownReason::ReceiverUnreachable));
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
    }

    #[test]
    fn test_wait_timeout_elapses_when_running() {
        let shutdown = ShutdownContext::new();
        let start = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_unbounded_wait_returns_on_stop() {
        let shutdown = ShutdownContext::new();
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || shutdown.wait_timeout(Duration::MAX))
        };

        thread::sleep(Duration::from_millis(20));
        shutdown.request_stop(ShutdownReason::Completed);
        assert!(waiter.join().unwrap());

        // Already stopped: returns without waiting
        assert!(shutdown.wait_timeout(Duration::MAX));
    }

    #[test]
    fn test_wait_timeout_wakes_on_stop() {
        let shutdown = ShutdownContext::new();
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let start = Instant::now();
                let stopped = shutdown.wait_timeout(Duration::from_secs(10));
                (stopped, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        shutdown.request_stop(ShutdownReason::Interrupt);

        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_child_follows_parent_but_not_reverse() {
        let parent = ShutdownContext::new();
        let child = parent.child();

        child.request_stop(ShutdownReason::Completed);
        assert!(child.is_stopping());
        assert!(parent.is_running());

        let second = parent.child();
        parent.request_stop(ShutdownReason::ReceiverUnreachable);
        assert!(second.is_stopping());
        assert_eq!(second.reason(), Some(ShutdownReason::ReceiverUnreachable));

        // Created after the parent stopped
        let late = parent.child();
        assert!(late.is_stopping());
    }

    #[test]
    fn test_degraded_flag() {
        let shutdown = ShutdownContext::new();
        assert!(!shutdown.set_degraded(true));
        assert!(shutdown.is_degraded());
        assert!(shutdown.set_degraded(false));
        assert!(!shutdown.is_degraded());
    }
}
