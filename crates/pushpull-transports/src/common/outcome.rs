//! Results of single send/receive attempts

use super::error::TransportError;

/// Outcome of one send attempt
///
/// `Timeout` and `WouldBlock` are expected when no receiver is reachable
/// and are safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport
    Sent,
    /// Blocking send did not complete within the timeout
    Timeout,
    /// Non-blocking send could not be queued
    WouldBlock,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Outcome of one receive attempt
#[derive(Debug)]
pub enum RecvOutcome {
    /// Raw bytes of one frame
    Received(Vec<u8>),
    /// Nothing arrived within the timeout
    Empty,
    /// Receive failed; the endpoint may still be usable
    Error(TransportError),
}

impl RecvOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, RecvOutcome::Empty)
    }
}
