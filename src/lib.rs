//! # pushpull - brokerless push/pull messaging over ZeroMQ
//!
//! A receiver binds a PULL endpoint and processes tasks on a background
//! pipeline; a sender runs a pool of workers that each connect a PUSH
//! endpoint and send numbered tasks. ZeroMQ load-balances between the two.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! pushpull = "0.1"
//! ```
//!
//! ## Binaries
//!
//! - **`pushpull-receiver`**: bind, receive, process, drain on Ctrl+C
//! - **`pushpull-sender`**: preflight, worker pool, health monitor, summary
//!
//! Both read `pushpull.toml` (see [`config::find_config_file`]), then
//! `PUSHPULL_*` environment variables, then command-line flags.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pushpull::prelude::*;
//!
//! let shutdown = ShutdownContext::new();
//! let coordinator = ShutdownCoordinator::new(shutdown.clone(), TransportContext::new()?);
//!
//! let context = coordinator.context()?;
//! let mut receiver = ReceiverPipeline::new(&context, ReceiverSettings::default(), &shutdown);
//! drop(context);
//! receiver.bind()?;
//! receiver.start(LoggingHandler::new(Duration::from_millis(100)))?;
//! coordinator.register(receiver)?;
//!
//! // ... until Ctrl+C sets the shutdown context
//! let report = coordinator.shutdown(ShutdownReason::Interrupt, Duration::from_secs(3));
//! assert!(report.context_terminated);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Organization
//!
//! - [`config`]: TOML loading, overrides, validation
//! - [`observability`]: logging initialisation and debug flags
//! - [`transports`]: messages, wire frames, ZMQ endpoints
//! - [`io`]: receiver pipeline, worker pool, health monitor, shutdown

pub use pushpull_config as config;
pub use pushpull_io as io;
pub use pushpull_observability as observability;
pub use pushpull_transports as transports;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, PushPullConfig};
    pub use crate::io::prelude::*;
    pub use crate::transports::{
        EndpointOptions, EndpointRole, Message, TransportContext, TransportError, WireFrame,
    };
}
