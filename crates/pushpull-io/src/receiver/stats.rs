//! Receiver counters and final report

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters shared by the intake and processor loops
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub(crate) received: AtomicU64,
    pub(crate) heartbeats: AtomicU64,
    pub(crate) receive_errors: AtomicU64,
    pub(crate) enqueue_dropped: AtomicU64,
    pub(crate) processed: AtomicU64,
    pub(crate) handler_errors: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

impl ReceiverStats {
    /// Count a received task; returns its receiver-wide running number
    pub(crate) fn next_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Point-in-time copy
    pub fn snapshot(&self, queue_remaining: usize, stragglers: Vec<String>) -> ReceiverReport {
        ReceiverReport {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            enqueue_dropped: self.enqueue_dropped.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            queue_remaining,
            stragglers,
        }
    }
}

/// Final receiver statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverReport {
    /// Task frames accepted by intake
    pub received: u64,
    /// Messages the handler completed
    pub processed: u64,
    /// Left in the queue at the drain deadline
    pub dropped: u64,
    /// Dropped because the bounded queue stayed full
    pub enqueue_dropped: u64,
    pub heartbeats: u64,
    pub receive_errors: u64,
    pub handler_errors: u64,
    pub queue_remaining: usize,
    /// Loop threads still running at the join deadline
    pub stragglers: Vec<String>,
}
