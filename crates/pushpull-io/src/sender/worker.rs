// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! One sending worker: connect (with retry) → send loop → cleanup
//!
//! A worker owns exactly one PUSH transport for its whole life and closes it
//! on every exit path. Its counters live in a shared [`WorkerStatus`] that
//! only the worker thread writes.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pushpull_transports::{
    sender_identity, Push, SendOutcome, Transport, TransportContext, TransportError, WireFrame,
    ZmqPush,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::SenderError;
use crate::reconnect::{retry_with_backoff, ReconnectionStrategy, RetryError};
use crate::settings::SenderSettings;
use crate::shutdown::ShutdownContext;

/// Live per-worker counters
#[derive(Debug)]
pub struct WorkerStatus {
    name: String,
    identity: String,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    last_sequence_id: AtomicU64,
    connected: AtomicBool,
    retry_count: AtomicU32,
}

impl WorkerStatus {
    pub fn new(name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            last_sequence_id: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            retry_count: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn add_retries(&self, retries: u32) {
        self.retry_count.fetch_add(retries, Ordering::Relaxed);
    }

    /// Snapshot for reporting
    pub fn report(&self) -> WorkerReport {
        WorkerReport {
            name: self.name.clone(),
            identity: self.identity.clone(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            last_sequence_id: self.last_sequence_id.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Acquire),
            retry_count: self.retry_count.load(Ordering::Relaxed),
        }
    }
}

/// Final state of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub name: String,
    pub identity: String,
    pub messages_sent: u64,
    pub messages_failed: u64,
    /// Highest sequence id delivered to the transport
    pub last_sequence_id: u64,
    pub connected: bool,
    /// Connect and send retries combined
    pub retry_count: u32,
}

/// A sending worker, run on its own thread
pub struct Worker {
    settings: Arc<SenderSettings>,
    context: TransportContext,
    shutdown: Arc<ShutdownContext>,
    status: Arc<WorkerStatus>,
}

impl Worker {
    /// `index` is 1-based; the worker is named `<prefix>-<index>`
    pub fn new(
        index: usize,
        settings: Arc<SenderSettings>,
        context: TransportContext,
        shutdown: Arc<ShutdownContext>,
    ) -> Self {
        let name = format!("{}-{}", settings.worker_name_prefix, index);
        let identity = sender_identity(&name, std::process::id());
        Self {
            status: Arc::new(WorkerStatus::new(name, identity)),
            settings,
            context,
            shutdown,
        }
    }

    pub fn name(&self) -> &str {
        self.status.name()
    }

    pub fn status(&self) -> Arc<WorkerStatus> {
        Arc::clone(&self.status)
    }

    /// Run to completion over a ZMQ PUSH socket and report
    pub fn run(self) -> WorkerReport {
        let push = ZmqPush::new(
            self.context.clone(),
            self.settings.address.clone(),
            self.settings.endpoint.clone(),
        );
        self.run_with(push)
    }

    /// Run to completion over any push transport; it is stopped on return
    pub fn run_with<P: Push>(self, mut push: P) -> WorkerReport {
        let started = Instant::now();
        match self.connect(&mut push) {
            Ok(()) => {
                self.status.connected.store(true, Ordering::Release);
                info!("[PUSHER] ✅ {} connected to {}", self.status.identity, self.settings.address);
                self.send_loop(&push, started);
            }
            Err(e) => {
                warn!("[PUSHER] {} not sending: {}", self.status.identity, e);
            }
        }

        // Explicit close; Drop covers early returns and panics
        if let Err(e) = push.stop() {
            warn!("[PUSHER] {} close failed: {}", self.status.identity, e);
        }

        let report = self.status.report();
        info!(
            "[PUSHER] {} finished: sent={} failed={} retries={} in {:.2}s",
            report.identity,
            report.messages_sent,
            report.messages_failed,
            report.retry_count,
            started.elapsed().as_secs_f64()
        );
        report
    }

    fn connect<P: Push>(&self, push: &mut P) -> Result<(), SenderError> {
        let attempts = self.settings.connection_retry_attempts.max(1);
        let mut strategy = ReconnectionStrategy::new(self.settings.connect_retry_delay, attempts);
        let server_timeout = self.settings.server_timeout;
        let identity = &self.status.identity;
        let operation = format!("{} connect", identity);

        let result = retry_with_backoff(
            |attempt| {
                debug!(
                    "[PUSHER] {} connect attempt {}/{} to {}",
                    identity, attempt, attempts, self.settings.address
                );
                if !push.is_running() {
                    push.start()?;
                }
                if push.wait_ready(server_timeout)? {
                    Ok(())
                } else {
                    Err(TransportError::Timeout)
                }
            },
            &mut strategy,
            &operation,
            &self.shutdown,
        );
        self.status.add_retries(strategy.retries());

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Exhausted { attempts, .. }) => Err(SenderError::ConnectExhausted {
                worker: identity.clone(),
                attempts,
            }),
            Err(RetryError::Interrupted { .. }) => Err(SenderError::Interrupted {
                worker: identity.clone(),
            }),
            Err(RetryError::Fatal(e)) => {
                error!("[PUSHER] {} cannot connect: {}", identity, e);
                Err(SenderError::Transport(e))
            }
        }
    }

    fn send_loop<P: Push>(&self, push: &P, started: Instant) {
        let settings = &self.settings;
        let identity = &self.status.identity;
        let total = settings.messages_per_worker;

        for i in 0..total {
            if self.shutdown.is_stopping() {
                info!("[PUSHER] {} stopping: shutdown requested", identity);
                break;
            }
            if started.elapsed() >= settings.max_runtime {
                warn!(
                    "[PUSHER] ⚠ {} reached max runtime {:?}; stopping after {} messages",
                    identity, settings.max_runtime, i
                );
                break;
            }

            let sequence_id = i + 1;
            let frame = WireFrame::task(sequence_id, identity.as_str(), format!("Task {}", sequence_id));
            let bytes = match frame.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.status.messages_failed.fetch_add(1, Ordering::Relaxed);
                    error!("[PUSHER] {} could not encode Task {}: {}", identity, sequence_id, e);
                    continue;
                }
            };

            if self.send_with_retry(push, sequence_id, &bytes) == SendResult::Abort {
                break;
            }

            if sequence_id < total
                && !settings.message_delay.is_zero()
                && self.shutdown.wait_timeout(settings.message_delay)
            {
                info!("[PUSHER] {} stopping: shutdown requested", identity);
                break;
            }
        }
    }

    fn send_with_retry<P: Push>(&self, push: &P, sequence_id: u64, bytes: &[u8]) -> SendResult {
        let identity = &self.status.identity;
        let mut strategy = ReconnectionStrategy::new(
            self.settings.send_retry_delay,
            self.settings.send_retry_attempts.max(1),
        );
        let operation = format!("{} send Task {}", identity, sequence_id);

        let result = retry_with_backoff(
            |_| match push.push_timeout(bytes, self.settings.server_timeout)? {
                SendOutcome::Sent => Ok(()),
                SendOutcome::Timeout | SendOutcome::WouldBlock => Err(TransportError::Timeout),
            },
            &mut strategy,
            &operation,
            &self.shutdown,
        );
        self.status.add_retries(strategy.retries());

        match result {
            Ok(()) => {
                self.status.messages_sent.fetch_add(1, Ordering::Relaxed);
                self.status.last_sequence_id.store(sequence_id, Ordering::Relaxed);
                info!("[PUSHER] {} - Task {}", identity, sequence_id);
                SendResult::Sent
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                self.status.messages_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "[PUSHER] ⚠ {} Task {} not sent after {} attempts: {}",
                    identity, sequence_id, attempts, last
                );
                SendResult::Failed
            }
            Err(RetryError::Interrupted { .. }) => {
                self.status.messages_failed.fetch_add(1, Ordering::Relaxed);
                info!("[PUSHER] {} Task {} abandoned: shutdown requested", identity, sequence_id);
                SendResult::Abort
            }
            Err(RetryError::Fatal(e)) => {
                self.status.messages_failed.fetch_add(1, Ordering::Relaxed);
                error!("[PUSHER] ❌ {} Task {} failed: {}", identity, sequence_id, e);
                SendResult::Abort
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendResult {
    Sent,
    /// Retries exhausted; move on to the next message
    Failed,
    /// Endpoint unusable or shutdown requested
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pushpull_transports::{Message, TransportResult};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Push transport that answers sends from a script, then `Sent`
    struct ScriptedPush {
        running: bool,
        script: Mutex<VecDeque<SendOutcome>>,
        delivered: Arc<Mutex<Vec<u64>>>,
    }

    impl ScriptedPush {
        /// Returns the transport and the sequence ids it accepts
        fn new(script: &[SendOutcome]) -> (Self, Arc<Mutex<Vec<u64>>>) {
            let delivered = Arc::new(Mutex::new(Vec::new()));
            let push = Self {
                running: false,
                script: Mutex::new(script.iter().copied().collect()),
                delivered: Arc::clone(&delivered),
            };
            (push, delivered)
        }
    }

    impl Transport for ScriptedPush {
        fn start(&mut self) -> TransportResult<()> {
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) -> TransportResult<()> {
            self.running = false;
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn transport_type(&self) -> &str {
            "scripted"
        }
    }

    impl Push for ScriptedPush {
        fn push(&self, data: &[u8]) -> TransportResult<SendOutcome> {
            self.push_timeout(data, Duration::ZERO)
        }

        fn push_timeout(&self, data: &[u8], _timeout: Duration) -> TransportResult<SendOutcome> {
            let outcome = self.script.lock().pop_front().unwrap_or(SendOutcome::Sent);
            if outcome == SendOutcome::Sent {
                if let Some(message) = Message::from_frame(WireFrame::decode(data)?) {
                    self.delivered.lock().push(message.sequence_id());
                }
            }
            Ok(outcome)
        }

        fn wait_ready(&self, _timeout: Duration) -> TransportResult<bool> {
            Ok(self.running)
        }
    }

    fn worker(messages: u64) -> Worker {
        let settings = SenderSettings {
            address: "tcp://127.0.0.1:1".to_string(),
            messages_per_worker: messages,
            message_delay: Duration::ZERO,
            send_retry_attempts: 2,
            send_retry_delay: Duration::from_millis(5),
            ..SenderSettings::default()
        };
        Worker::new(
            1,
            Arc::new(settings),
            TransportContext::new().unwrap(),
            ShutdownContext::new(),
        )
    }

    #[test]
    fn test_exhausted_send_skips_to_next_message() {
        let (push, delivered) = ScriptedPush::new(&[SendOutcome::Timeout, SendOutcome::Timeout]);
        let report = worker(3).run_with(push);

        assert!(report.connected);
        assert_eq!(report.messages_failed, 1);
        assert_eq!(report.messages_sent, 2);
        assert_eq!(report.retry_count, 1);
        assert_eq!(report.last_sequence_id, 3);

        assert_eq!(*delivered.lock(), vec![2, 3]);
    }

    #[test]
    fn test_retry_recovers_within_budget() {
        let (push, delivered) = ScriptedPush::new(&[SendOutcome::WouldBlock]);
        let report = worker(2).run_with(push);

        assert_eq!(report.messages_failed, 0);
        assert_eq!(report.messages_sent, 2);
        assert_eq!(report.retry_count, 1);
        assert_eq!(*delivered.lock(), vec![1, 2]);
    }

    #[test]
    fn test_stopped_worker_sends_nothing() {
        let worker = worker(5);
        worker.shutdown.request_stop(crate::shutdown::ShutdownReason::Interrupt);
        let (push, delivered) = ScriptedPush::new(&[]);
        let report = worker.run_with(push);

        assert_eq!(report.messages_sent, 0);
        assert!(delivered.lock().is_empty());
    }
}
