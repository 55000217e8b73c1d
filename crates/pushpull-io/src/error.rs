// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for pipelines, pools and coordination

use pushpull_transports::TransportError;

use crate::receiver::PipelineState;

/// Receiving pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// Could not bind the pull endpoint; fatal for the receiver process
    #[error("Failed to bind receiver: {0}")]
    Bind(#[source] TransportError),

    #[error("Operation '{operation}' not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sending worker pool and health monitor errors
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("{worker}: gave up connecting after {attempts} attempts")]
    ConnectExhausted { worker: String, attempts: u32 },

    #[error("{worker}: interrupted by shutdown")]
    Interrupted { worker: String },

    #[error("Receiver unreachable: {0}")]
    ReceiverUnreachable(#[source] TransportError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Shutdown coordinator errors
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Shutdown already completed")]
    AlreadyShutDown,
}
