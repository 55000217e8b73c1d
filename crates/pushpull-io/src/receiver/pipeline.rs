// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Receiving pipeline: PULL transport → intake loop → queue → processor loop
//!
//! ```text
//! Idle --bind--> Bound --stop--> Draining --queue empty / deadline--> Closed
//! ```
//!
//! The intake thread owns the transport and is the only producer; the
//! processor thread is the only consumer. Stop comes from the shared
//! shutdown context (or [`ReceiverPipeline::shutdown`]); intake stops
//! receiving at once, the processor keeps going until the queue is empty or
//! the drain deadline passes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use pushpull_transports::{
    Message, Pull, RecvOutcome, Transport, TransportContext, TransportError, WireFrame, ZmqPull,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::handler::MessageHandler;
use super::stats::{ReceiverReport, ReceiverStats};
use crate::error::ReceiverError;
use crate::settings::ReceiverSettings;
use crate::shutdown::{ShutdownContext, ShutdownReason};
use crate::task::{JoinOutcome, ManagedThread, ShutdownTask, TaskReport, TaskStatus};

const INTAKE_THREAD: &str = "receiver-intake";
const PROCESSOR_THREAD: &str = "receiver-processor";

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Bound = 1,
    Draining = 2,
    Closed = 3,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: PipelineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> PipelineState {
        match self.0.load(Ordering::Acquire) {
            0 => PipelineState::Idle,
            1 => PipelineState::Bound,
            2 => PipelineState::Draining,
            _ => PipelineState::Closed,
        }
    }

    fn store(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// State shared by both loops
#[derive(Clone)]
struct LoopContext {
    settings: Arc<ReceiverSettings>,
    root: Arc<ShutdownContext>,
    stop: Arc<ShutdownContext>,
    state: Arc<StateCell>,
    stats: Arc<ReceiverStats>,
}

/// Bound PULL transport plus intake and processor threads
pub struct ReceiverPipeline {
    settings: Arc<ReceiverSettings>,
    context: Option<TransportContext>,
    root: Arc<ShutdownContext>,
    stop: Arc<ShutdownContext>,
    state: Arc<StateCell>,
    stats: Arc<ReceiverStats>,
    transport: Option<ZmqPull>,
    local_address: Option<String>,
    queue: Option<Receiver<Message>>,
    intake: Option<ManagedThread<()>>,
    processor: Option<ManagedThread<()>>,
    report: Option<ReceiverReport>,
}

impl ReceiverPipeline {
    /// Create an idle pipeline
    ///
    /// The transport context handle moves into the PULL transport once bound.
    pub fn new(
        context: &TransportContext,
        settings: ReceiverSettings,
        shutdown: &Arc<ShutdownContext>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            context: Some(context.clone()),
            root: Arc::clone(shutdown),
            stop: shutdown.child(),
            state: Arc::new(StateCell::new(PipelineState::Idle)),
            stats: Arc::new(ReceiverStats::default()),
            transport: None,
            local_address: None,
            queue: None,
            intake: None,
            processor: None,
            report: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    /// Live counters
    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.stats)
    }

    /// Actual bound address (resolves `*` ports)
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    /// Messages waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, Receiver::len)
    }

    /// Bind the PULL transport: Idle → Bound
    ///
    /// # Errors
    /// - [`ReceiverError::Bind`] if the address is unavailable; the pipeline
    ///   stays Idle
    /// - [`ReceiverError::InvalidState`] if not Idle
    pub fn bind(&mut self) -> Result<(), ReceiverError> {
        let state = self.state.load();
        let context = match (state, self.context.take()) {
            (PipelineState::Idle, Some(context)) => context,
            (_, context) => {
                self.context = context;
                return Err(ReceiverError::InvalidState {
                    operation: "bind",
                    state,
                });
            }
        };

        let mut transport = ZmqPull::new(
            context.clone(),
            self.settings.bind_address.clone(),
            self.settings.endpoint.clone(),
        );
        match transport.start() {
            Ok(()) => {
                self.local_address = transport.resolved_address().map(str::to_string);
                self.transport = Some(transport);
                self.state.store(PipelineState::Bound);
                Ok(())
            }
            Err(e) => {
                error!("[INTAKE] ❌ Bind to {} failed: {}", self.settings.bind_address, e);
                self.context = Some(context);
                Err(ReceiverError::Bind(e))
            }
        }
    }

    /// Spawn the intake and processor threads; requires Bound
    pub fn start<H: MessageHandler>(&mut self, handler: H) -> Result<(), ReceiverError> {
        let state = self.state.load();
        let transport = match self.transport.take() {
            Some(transport) if state == PipelineState::Bound => transport,
            other => {
                self.transport = other;
                return Err(ReceiverError::InvalidState {
                    operation: "start",
                    state,
                });
            }
        };

        let (tx, rx) = if self.settings.queue_capacity > 0 {
            channel::bounded(self.settings.queue_capacity)
        } else {
            channel::unbounded()
        };
        self.queue = Some(rx.clone());

        let ctx = LoopContext {
            settings: Arc::clone(&self.settings),
            root: Arc::clone(&self.root),
            stop: Arc::clone(&self.stop),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        };

        let processor_ctx = ctx.clone();
        let processor = ManagedThread::spawn(PROCESSOR_THREAD, move || {
            run_processor(rx, handler, processor_ctx)
        })
        .map_err(|source| ReceiverError::Spawn {
            name: PROCESSOR_THREAD.to_string(),
            source,
        })?;
        self.processor = Some(processor);

        // On spawn failure the closure (transport and sender) is dropped,
        // which closes the socket and lets the processor exit
        let intake = ManagedThread::spawn(INTAKE_THREAD, move || run_intake(transport, tx, ctx))
            .map_err(|source| ReceiverError::Spawn {
                name: INTAKE_THREAD.to_string(),
                source,
            })?;
        self.intake = Some(intake);

        info!(
            "[INTAKE] Receiver started on {} (queue: {})",
            self.local_address.as_deref().unwrap_or(&self.settings.bind_address),
            match self.settings.queue_capacity {
                0 => "unbounded".to_string(),
                n => format!("bounded {}", n),
            }
        );
        Ok(())
    }

    /// Stop, drain and join; idempotent
    ///
    /// Intake is joined within `join_timeout`; the processor gets the drain
    /// timeout on top of that. Threads still running afterwards are reported
    /// as stragglers and detached.
    pub fn shutdown(&mut self, join_timeout: Duration) -> ReceiverReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let reason = self.root.reason().unwrap_or(ShutdownReason::Completed);
        self.stop.request_stop(reason);

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.stop() {
                warn!("[INTAKE] Closing unstarted transport: {}", e);
            }
        }
        self.context = None;

        let mut stragglers = Vec::new();
        if let Some(intake) = self.intake.take() {
            join_loop(intake, join_timeout, &mut stragglers);
        }
        if let Some(processor) = self.processor.take() {
            let timeout = self.settings.drain_timeout.saturating_add(join_timeout);
            join_loop(processor, timeout, &mut stragglers);
        }
        self.state.store(PipelineState::Closed);

        let report = self.stats.snapshot(self.queue_len(), stragglers);
        self.queue = None;

        info!(
            "[RECEIVER] Final statistics: received={} processed={} dropped={} enqueue_dropped={} heartbeats={} receive_errors={} handler_errors={} queue_remaining={}",
            report.received,
            report.processed,
            report.dropped,
            report.enqueue_dropped,
            report.heartbeats,
            report.receive_errors,
            report.handler_errors,
            report.queue_remaining
        );
        if !report.stragglers.is_empty() {
            warn!("[RECEIVER] Threads still running: {:?}", report.stragglers);
        }

        self.report = Some(report.clone());
        report
    }
}

impl ShutdownTask for ReceiverPipeline {
    fn name(&self) -> &str {
        "receiver-pipeline"
    }

    fn join_within(self: Box<Self>, timeout: Duration) -> TaskReport {
        let mut pipeline = *self;
        let report = pipeline.shutdown(timeout);
        TaskReport {
            name: "receiver-pipeline".to_string(),
            status: if report.stragglers.is_empty() {
                TaskStatus::Finished
            } else {
                TaskStatus::Straggler
            },
        }
    }
}

impl Drop for ReceiverPipeline {
    fn drop(&mut self) {
        if self.report.is_none() {
            let timeout = self.settings.join_timeout;
            self.shutdown(timeout);
        }
    }
}

fn join_loop(thread: ManagedThread<()>, timeout: Duration, stragglers: &mut Vec<String>) {
    let name = thread.name().to_string();
    match thread.join_timeout(timeout) {
        JoinOutcome::Finished(()) => debug!("[RECEIVER] {} joined", name),
        JoinOutcome::Panicked(msg) => error!("[RECEIVER] {} panicked: {}", name, msg),
        JoinOutcome::TimedOut(thread) => {
            warn!("[RECEIVER] {} still running after {:?}", name, timeout);
            thread.detach();
            stragglers.push(name);
        }
    }
}

fn run_intake<P: Pull>(mut transport: P, tx: Sender<Message>, ctx: LoopContext) {
    let poll_interval = ctx.settings.poll_interval;
    let enqueue_timeout = ctx.settings.enqueue_timeout;
    let nonblocking = ctx.settings.endpoint.nonblocking;
    info!("[INTAKE] Waiting for messages...");

    while !ctx.stop.is_stopping() && ctx.state.load() == PipelineState::Bound {
        match transport.pull_timeout(poll_interval) {
            RecvOutcome::Received(bytes) => {
                let frame = match WireFrame::decode(&bytes) {
                    Ok(frame) => frame,
                    Err(e) => {
                        ReceiverStats::incr(&ctx.stats.receive_errors);
                        warn!("[INTAKE] Dropping undecodable frame ({} bytes): {}", bytes.len(), e);
                        continue;
                    }
                };

                if frame.is_heartbeat() {
                    ReceiverStats::incr(&ctx.stats.heartbeats);
                    debug!("[INTAKE] 💓 Heartbeat from {}", frame.sender());
                    continue;
                }

                let Some(message) = Message::from_frame(frame) else {
                    continue;
                };
                let number = ctx.stats.next_received();
                info!(
                    "[MSG #{:03}] From {}: {}",
                    number,
                    message.sender_identity(),
                    message.payload()
                );

                match tx.send_timeout(message, enqueue_timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(message)) => {
                        ReceiverStats::incr(&ctx.stats.enqueue_dropped);
                        warn!(
                            "[INTAKE] Queue full for {:?}; dropped #{} from {}",
                            enqueue_timeout,
                            message.sequence_id(),
                            message.sender_identity()
                        );
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        ReceiverStats::incr(&ctx.stats.enqueue_dropped);
                        error!("[INTAKE] Processor is gone; stopping intake");
                        break;
                    }
                }
            }
            // A non-blocking pull returns at once; pace the loop here
            RecvOutcome::Empty if nonblocking => {
                ctx.stop.wait_timeout(poll_interval);
            }
            RecvOutcome::Empty => continue,
            RecvOutcome::Error(e @ (TransportError::Closed | TransportError::ContextTerminated)) => {
                error!("[INTAKE] Endpoint unusable: {}", e);
                ctx.root.request_stop(ShutdownReason::Fatal(format!("intake: {}", e)));
                break;
            }
            RecvOutcome::Error(e) => {
                ReceiverStats::incr(&ctx.stats.receive_errors);
                warn!("[INTAKE] Receive error: {}", e);
                ctx.stop.wait_timeout(poll_interval);
            }
        }
    }

    if let Err(e) = transport.stop() {
        warn!("[INTAKE] Closing {} failed: {}", transport.transport_type(), e);
    }
    info!("[INTAKE] Stopped receiving");
}

fn run_processor<H: MessageHandler>(rx: Receiver<Message>, mut handler: H, ctx: LoopContext) {
    let poll_interval = ctx.settings.poll_interval;
    info!("[PROC] Processor started");

    while !ctx.stop.is_stopping() {
        match rx.recv_timeout(poll_interval) {
            Ok(message) => process(&mut handler, &message, &ctx.stats),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    ctx.state.transition(PipelineState::Bound, PipelineState::Draining);
    let pending = rx.len();
    if pending > 0 {
        info!("[PROC] Draining {} queued messages", pending);
    }

    // No deadline when the drain timeout does not fit in an Instant
    let deadline = Instant::now().checked_add(ctx.settings.drain_timeout);
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                (deadline - now).min(poll_interval)
            }
            None => poll_interval,
        };
        match rx.recv_timeout(wait) {
            Ok(message) => process(&mut handler, &message, &ctx.stats),
            Err(RecvTimeoutError::Timeout) => continue,
            // Intake finished and the queue is empty
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let dropped = rx.try_iter().count() as u64;
    if dropped > 0 {
        ctx.stats.dropped.fetch_add(dropped, Ordering::Relaxed);
        warn!(
            "[PROC] Drain deadline reached; dropped {} unprocessed messages",
            dropped
        );
    }

    ctx.state.store(PipelineState::Closed);
    info!("[PROC] Processor stopped ({} processed)", ctx.stats.processed());
}

fn process<H: MessageHandler>(handler: &mut H, message: &Message, stats: &ReceiverStats) {
    match handler.handle(message) {
        Ok(()) => ReceiverStats::incr(&stats.processed),
        Err(e) => {
            ReceiverStats::incr(&stats.handler_errors);
            warn!(
                "[PROC] Handler failed on #{} from {}: {}",
                message.sequence_id(),
                message.sender_identity(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::HandlerError;
    use parking_lot::Mutex;
    use pushpull_transports::{Endpoint, EndpointOptions, EndpointRole};

    /// Connected PUSH endpoint that has seen the receiver
    fn push_to(context: &TransportContext, address: &str) -> Endpoint {
        let push = Endpoint::create(context, EndpointRole::Push, address, EndpointOptions::default())
            .unwrap();
        assert!(push.wait_writable(Duration::from_secs(3)).unwrap());
        push
    }

    fn send_tasks(push: &Endpoint, count: u64) {
        for seq in 1..=count {
            let frame = WireFrame::task(seq, "Pusher-1[PID:1]", format!("Task {}", seq));
            push.send(&frame.encode().unwrap(), Duration::from_secs(1)).unwrap();
        }
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn settings(address: &str) -> ReceiverSettings {
        ReceiverSettings {
            bind_address: address.to_string(),
            poll_interval: Duration::from_millis(20),
            drain_timeout: Duration::from_millis(500),
            processing_delay: Duration::ZERO,
            join_timeout: Duration::from_secs(2),
            ..ReceiverSettings::default()
        }
    }

    #[test]
    fn test_bind_then_invalid_state() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut pipeline = ReceiverPipeline::new(&context, settings("tcp://127.0.0.1:*"), &shutdown);
        assert_eq!(pipeline.state(), PipelineState::Idle);

        pipeline.bind().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Bound);
        assert!(pipeline.local_address().is_some());

        assert!(matches!(
            pipeline.bind(),
            Err(ReceiverError::InvalidState {
                operation: "bind",
                state: PipelineState::Bound
            })
        ));

        let report = pipeline.shutdown(Duration::from_secs(1));
        assert_eq!(report, ReceiverReport::default());
        assert_eq!(pipeline.state(), PipelineState::Closed);
        assert_eq!(context.registry().open_count(), 0);
    }

    #[test]
    fn test_start_requires_bound() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut pipeline = ReceiverPipeline::new(&context, settings("tcp://127.0.0.1:*"), &shutdown);
        let handler = |_: &Message| -> Result<(), HandlerError> { Ok(()) };
        assert!(matches!(
            pipeline.start(handler),
            Err(ReceiverError::InvalidState {
                operation: "start",
                state: PipelineState::Idle
            })
        ));
    }

    #[test]
    fn test_bind_conflict_keeps_idle() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut first = ReceiverPipeline::new(&context, settings("tcp://127.0.0.1:*"), &shutdown);
        first.bind().unwrap();
        let taken = first.local_address().unwrap().to_string();

        let mut second = ReceiverPipeline::new(&context, settings(&taken), &shutdown);
        assert!(matches!(second.bind(), Err(ReceiverError::Bind(_))));
        assert_eq!(second.state(), PipelineState::Idle);
    }

    #[test]
    fn test_processes_frames_then_drains() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut pipeline = ReceiverPipeline::new(&context, settings("tcp://127.0.0.1:*"), &shutdown);
        pipeline.bind().unwrap();
        let address = pipeline.local_address().unwrap().to_string();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline
            .start(move |message: &Message| -> Result<(), HandlerError> {
                sink.lock().push(message.payload().to_string());
                Ok(())
            })
            .unwrap();

        let push = push_to(&context, &address);
        let heartbeat = WireFrame::heartbeat("Pusher-Health[PID:1]").encode().unwrap();
        push.send(&heartbeat, Duration::from_secs(1)).unwrap();
        send_tasks(&push, 3);

        let stats = pipeline.stats();
        assert!(wait_until(Duration::from_secs(5), || stats.processed() == 3));

        let report = pipeline.shutdown(Duration::from_secs(2));
        assert_eq!(report.received, 3);
        assert_eq!(report.processed, 3);
        assert_eq!(report.heartbeats, 1);
        assert_eq!(report.dropped, 0);
        assert!(report.stragglers.is_empty());
        assert_eq!(*seen.lock(), vec!["Task 1", "Task 2", "Task 3"]);

        // Idempotent
        assert_eq!(pipeline.shutdown(Duration::from_secs(2)), report);
        assert!(shutdown.is_running());
    }

    #[test]
    fn test_drain_deadline_drops_backlog() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut receiver = settings("tcp://127.0.0.1:*");
        receiver.drain_timeout = Duration::from_millis(300);
        let mut pipeline = ReceiverPipeline::new(&context, receiver, &shutdown);
        pipeline.bind().unwrap();
        let address = pipeline.local_address().unwrap().to_string();
        pipeline
            .start(|_: &Message| -> Result<(), HandlerError> {
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            })
            .unwrap();

        let push = push_to(&context, &address);
        send_tasks(&push, 20);
        let stats = pipeline.stats();
        assert!(wait_until(Duration::from_secs(5), || stats.received() == 20));

        let report = pipeline.shutdown(Duration::from_secs(2));
        assert_eq!(report.received, 20);
        assert!(report.dropped > 0, "{:?}", report);
        assert_eq!(report.processed + report.dropped, report.received);
        assert_eq!(report.queue_remaining, 0);
        assert!(report.stragglers.is_empty());
    }

    #[test]
    fn test_full_queue_drops_on_enqueue() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut receiver = settings("tcp://127.0.0.1:*");
        receiver.queue_capacity = 1;
        receiver.enqueue_timeout = Duration::from_millis(20);
        receiver.drain_timeout = Duration::from_secs(2);
        let mut pipeline = ReceiverPipeline::new(&context, receiver, &shutdown);
        pipeline.bind().unwrap();
        let address = pipeline.local_address().unwrap().to_string();
        pipeline
            .start(|_: &Message| -> Result<(), HandlerError> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .unwrap();

        let push = push_to(&context, &address);
        send_tasks(&push, 5);
        let stats = pipeline.stats();
        assert!(wait_until(Duration::from_secs(5), || stats.received() == 5));

        let report = pipeline.shutdown(Duration::from_secs(2));
        assert_eq!(report.received, 5);
        assert!(report.enqueue_dropped > 0, "{:?}", report);
        assert_eq!(report.processed + report.enqueue_dropped, 5);
        assert_eq!(report.dropped, 0);
    }

    #[test]
    fn test_nonblocking_intake_stops_promptly() {
        let context = TransportContext::new().unwrap();
        let shutdown = ShutdownContext::new();
        let mut receiver = settings("tcp://127.0.0.1:*");
        receiver.endpoint = receiver.endpoint.with_nonblocking(true);
        let mut pipeline = ReceiverPipeline::new(&context, receiver, &shutdown);
        pipeline.bind().unwrap();
        let address = pipeline.local_address().unwrap().to_string();
        pipeline
            .start(|_: &Message| -> Result<(), HandlerError> { Ok(()) })
            .unwrap();

        let push = push_to(&context, &address);
        send_tasks(&push, 2);
        let stats = pipeline.stats();
        assert!(wait_until(Duration::from_secs(5), || stats.processed() == 2));

        shutdown.request_stop(ShutdownReason::Interrupt);
        let report = pipeline.shutdown(Duration::from_secs(1));
        assert_eq!(report.processed, 2);
        assert!(report.stragglers.is_empty());
    }
}
