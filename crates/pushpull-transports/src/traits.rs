// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Transport trait definitions
//!
//! Role interfaces for push/pull endpoints. Workers and the receiver talk to
//! these traits so scripted fakes can stand in for sockets in tests.

use std::time::Duration;

use crate::common::{RecvOutcome, SendOutcome, TransportResult};

/// Base transport trait - implemented by all transports
pub trait Transport: Send {
    /// Open the underlying endpoint (bind or connect)
    fn start(&mut self) -> TransportResult<()>;

    /// Close the underlying endpoint; safe to call repeatedly
    fn stop(&mut self) -> TransportResult<()>;

    /// Check if transport is running
    fn is_running(&self) -> bool;

    /// Get transport name/type
    fn transport_type(&self) -> &str;
}

/// Push-Pull pattern (Push side)
///
/// Used for distributing work to pull servers (load balancing).
pub trait Push: Transport {
    /// Push with the endpoint's configured timeout
    fn push(&self, data: &[u8]) -> TransportResult<SendOutcome>;

    /// Push with an explicit timeout (zero = do not wait)
    fn push_timeout(&self, data: &[u8], timeout: Duration) -> TransportResult<SendOutcome>;

    /// Wait until a peer is connected and the send buffer has room
    fn wait_ready(&self, timeout: Duration) -> TransportResult<bool>;
}

/// Push-Pull pattern (Pull side)
///
/// Used for receiving distributed work.
pub trait Pull: Transport {
    /// Pull with the endpoint's configured timeout
    fn pull(&self) -> RecvOutcome;

    /// Pull with an explicit timeout (zero = do not wait)
    fn pull_timeout(&self, timeout: Duration) -> RecvOutcome;
}
