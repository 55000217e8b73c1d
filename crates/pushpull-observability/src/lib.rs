// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! # pushpull-observability
//!
//! Logging setup shared by the receiver and sender binaries.
//!
//! Every log line carries a timestamp, a component tag (`[INTAKE]`, `[PUSHER]`,
//! ...) and, for message traffic, the sequence id. Per-crate debug output is
//! enabled with `--debug-<crate>` flags or the `PUSHPULL_DEBUG` variable.
//!
//! ## Features
//! - `file-logging`: append log lines to a file through a non-blocking writer

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Workspace crate names accepted by `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &[
    "pushpull",
    "pushpull-config",
    "pushpull-observability",
    "pushpull-transports",
    "pushpull-io",
];
