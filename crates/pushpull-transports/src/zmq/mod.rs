// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! ZMQ transport implementations
//!
//! - **Push-Pull**: PULL (server, binds) ↔ PUSH (client, connects)
//!
//! ## Feature Flags
//!
//! - `zmq-server`: Enable the PULL wrapper
//! - `zmq-client`: Enable the PUSH wrapper
//!
//! [`Endpoint`] and [`TransportContext`] are always available.

pub mod context;
pub mod endpoint;

#[cfg(feature = "zmq-server")]
pub mod server;

#[cfg(feature = "zmq-client")]
pub mod client;

pub use context::{EndpointRegistry, OpenEndpoint, TransportContext};
pub use endpoint::Endpoint;

#[cfg(feature = "zmq-server")]
pub use server::ZmqPull;

#[cfg(feature = "zmq-client")]
pub use client::ZmqPush;
