// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! # pushpull-io
//!
//! Threaded runtime on top of `pushpull-transports`:
//!
//! - **Receiver**: bound PULL endpoint, intake loop, bounded queue and a
//!   processor that drains it on shutdown
//! - **Sender**: pool of named workers, each with its own PUSH endpoint,
//!   connect/send retry with exponential backoff
//! - **Health**: periodic receiver probe that can request shutdown
//! - **Shutdown**: shared stop state and a coordinator that joins tasks and
//!   terminates the transport context
//!
//! ## Example: sender process
//!
//! ```no_run
//! use std::time::Duration;
//! use pushpull_io::prelude::*;
//! use pushpull_transports::TransportContext;
//!
//! let shutdown = ShutdownContext::new();
//! let coordinator = ShutdownCoordinator::new(shutdown.clone(), TransportContext::new()?);
//!
//! let settings = SenderSettings::default();
//! let handles = create_worker_threads(&coordinator.context()?, &settings, &shutdown)?;
//! let pool = wait_for_threads(handles, settings.pool_ceiling());
//! println!("sent {}", pool.messages_sent);
//!
//! coordinator.shutdown(ShutdownReason::Completed, Duration::from_secs(2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod coordinator;
pub mod error;
pub mod health;
pub mod receiver;
pub mod reconnect;
pub mod sender;
pub mod settings;
pub mod shutdown;
pub mod task;

pub use coordinator::{ShutdownCoordinator, ShutdownReport};
pub use error::{CoordinatorError, ReceiverError, SenderError};
pub use health::{
    preflight_check, probe_once, HealthMonitor, HealthMonitorHandle, HealthReport, HeartbeatProbe,
    ReceiverProbe,
};
pub use receiver::{
    HandlerError, LoggingHandler, MessageHandler, PipelineState, ReceiverPipeline, ReceiverReport,
    ReceiverStats,
};
pub use reconnect::{retry_with_backoff, ReconnectionStrategy, RetryError, Retryable};
pub use sender::{
    create_worker_threads, wait_for_threads, PoolReport, Worker, WorkerHandle, WorkerReport,
    WorkerStatus,
};
pub use settings::{endpoint_options, HealthSettings, ReceiverSettings, SenderSettings};
pub use shutdown::{ShutdownContext, ShutdownPhase, ShutdownReason};
pub use task::{JoinOutcome, ManagedThread, ShutdownTask, TaskReport, TaskStatus};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coordinator::*;
    pub use crate::error::*;
    pub use crate::health::*;
    pub use crate::receiver::*;
    pub use crate::sender::*;
    pub use crate::settings::*;
    pub use crate::shutdown::*;
}
