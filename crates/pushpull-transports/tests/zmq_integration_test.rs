// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for ZMQ PUSH/PULL pairs

use pushpull_transports::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pull_options() -> EndpointOptions {
    EndpointOptions::default()
        .with_timeout(Duration::from_millis(100))
        .with_linger(Duration::from_millis(1000))
}

fn push_options() -> EndpointOptions {
    EndpointOptions::default()
        .with_timeout(Duration::from_millis(3000))
        .with_linger(Duration::from_millis(100))
}

/// Receive until `count` frames arrived or the deadline passes
fn collect_frames(pull: &ZmqPull, count: usize, deadline: Duration) -> Vec<WireFrame> {
    let start = Instant::now();
    let mut frames = Vec::new();
    while frames.len() < count && start.elapsed() < deadline {
        if let RecvOutcome::Received(bytes) = pull.pull_timeout(Duration::from_millis(100)) {
            frames.push(WireFrame::decode(&bytes).unwrap());
        }
    }
    frames
}

/// Test PUSH-PULL roundtrip of task frames in order
#[test]
fn test_push_pull_task_roundtrip() {
    init_tracing();
    let barrier = Arc::new(Barrier::new(2));
    let barrier_server = Arc::clone(&barrier);
    let barrier_client = Arc::clone(&barrier);

    // Pull thread
    let pull_handle = thread::spawn(move || {
        let context = TransportContext::new().unwrap();
        let mut pull = ZmqPull::new(context.clone(), "tcp://127.0.0.1:31010", pull_options());
        pull.start().unwrap();

        barrier_server.wait();

        let frames = collect_frames(&pull, 5, Duration::from_secs(5));
        pull.stop().unwrap();
        drop(pull);
        context.terminate().unwrap();
        frames
    });

    // Push thread
    let push_handle = thread::spawn(move || {
        let context = TransportContext::new().unwrap();
        let mut push = ZmqPush::new(context, "tcp://127.0.0.1:31010", push_options());
        push.start().unwrap();

        barrier_client.wait();
        assert!(push.wait_ready(Duration::from_secs(3)).unwrap());

        for seq in 1..=5u64 {
            let frame = WireFrame::task(seq, "Pusher-1[PID:1]", format!("Task {}", seq));
            let outcome = push.push(&frame.encode().unwrap()).unwrap();
            assert_eq!(outcome, SendOutcome::Sent);
        }
        push.stop().unwrap();
    });

    push_handle.join().unwrap();
    let frames = pull_handle.join().unwrap();

    let payloads: Vec<String> = frames
        .into_iter()
        .filter_map(Message::from_frame)
        .map(|m| m.payload().to_string())
        .collect();
    assert_eq!(payloads, vec!["Task 1", "Task 2", "Task 3", "Task 4", "Task 5"]);
}

/// Several PUSH clients fan in to one PULL server; nothing lost or duplicated
#[test]
fn test_fan_in_from_multiple_pushers() {
    const PUSHERS: u64 = 4;
    const PER_PUSHER: u64 = 5;

    let context = TransportContext::new().unwrap();
    let mut pull = ZmqPull::new(context.clone(), "tcp://127.0.0.1:31011", pull_options());
    pull.start().unwrap();

    let handles: Vec<_> = (1..=PUSHERS)
        .map(|n| {
            let context = context.clone();
            thread::spawn(move || {
                let mut push = ZmqPush::new(context, "tcp://127.0.0.1:31011", push_options());
                push.start().unwrap();
                assert!(push.wait_ready(Duration::from_secs(3)).unwrap());
                let sender = format!("Pusher-{}[PID:1]", n);
                for seq in 1..=PER_PUSHER {
                    let frame = WireFrame::task(seq, sender.clone(), format!("Task {}", seq));
                    assert!(push.push(&frame.encode().unwrap()).unwrap().is_sent());
                }
                push.stop().unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let frames = collect_frames(&pull, (PUSHERS * PER_PUSHER) as usize, Duration::from_secs(5));
    let unique: BTreeSet<(String, u64)> = frames
        .iter()
        .filter_map(|f| match f {
            WireFrame::Task {
                sender, sequence_id, ..
            } => Some((sender.clone(), *sequence_id)),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), (PUSHERS * PER_PUSHER) as usize);
    assert_eq!(unique.len(), (PUSHERS * PER_PUSHER) as usize);

    pull.stop().unwrap();
    drop(pull);
    assert_eq!(context.registry().open_count(), 0);
    context.terminate().unwrap();
}

/// Heartbeat frames arrive but never decode into messages
#[test]
fn test_heartbeat_frames_are_distinguishable() {
    let context = TransportContext::new().unwrap();
    let mut pull = ZmqPull::new(context.clone(), "tcp://127.0.0.1:31012", pull_options());
    pull.start().unwrap();

    let mut push = ZmqPush::new(context.clone(), "tcp://127.0.0.1:31012", push_options());
    push.start().unwrap();
    assert!(push.wait_ready(Duration::from_secs(3)).unwrap());

    let beat = WireFrame::heartbeat("Pusher-Health[PID:1]");
    push.push(&beat.encode().unwrap()).unwrap();
    push.push(b"plain text").unwrap();

    let frames = collect_frames(&pull, 2, Duration::from_secs(5));
    assert_eq!(frames.len(), 2);
    assert!(frames[0].is_heartbeat());
    assert!(Message::from_frame(frames[0].clone()).is_none());
    let raw = Message::from_frame(frames[1].clone()).unwrap();
    assert_eq!(raw.payload(), "plain text");
    assert_eq!(raw.sender_identity(), "unknown");
}

/// With no receiver, readiness never arrives and blocking sends time out
#[test]
fn test_no_receiver_send_times_out() {
    let context = TransportContext::new().unwrap();
    let mut push = ZmqPush::new(
        context.clone(),
        "tcp://127.0.0.1:31013",
        push_options().with_no_linger(),
    );
    push.start().unwrap();

    assert!(!push.wait_ready(Duration::from_millis(200)).unwrap());

    let start = Instant::now();
    let outcome = push
        .push_timeout(b"Task 1", Duration::from_millis(200))
        .unwrap();
    assert_eq!(outcome, SendOutcome::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(150));

    push.stop().unwrap();
    drop(push);
    context.terminate().unwrap();
}
