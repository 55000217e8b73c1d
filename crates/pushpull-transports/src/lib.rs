//! # pushpull-transports
//!
//! Transport layer for the push/pull messaging subsystem: the [`Message`]
//! value, the wire frames exchanged between senders and the receiver, and
//! managed ZMQ endpoints for both roles.
//!
//! ## ZMQ (ZeroMQ)
//! - **Server**: PULL (bind, receive load-balanced work)
//! - **Client**: PUSH (connect, send work)
//!
//! ## Example: Push-Pull
//!
//! ```no_run
//! use pushpull_transports::prelude::*;
//! use std::time::Duration;
//!
//! let context = TransportContext::new()?;
//!
//! let mut pull = ZmqPull::new(context.clone(), "tcp://*:5560", EndpointOptions::default());
//! pull.start()?;
//!
//! let mut push = ZmqPush::new(context.clone(), "tcp://localhost:5560", EndpointOptions::default());
//! push.start()?;
//!
//! let frame = WireFrame::task(1, "Pusher-1[PID:42]", "Task 1");
//! push.push_timeout(&frame.encode()?, Duration::from_secs(1))?;
//!
//! if let RecvOutcome::Received(bytes) = pull.pull_timeout(Duration::from_secs(1)) {
//!     println!("{:?}", WireFrame::decode(&bytes)?);
//! }
//!
//! push.stop()?;
//! pull.stop()?;
//! context.terminate()?;
//! # Ok::<(), pushpull_transports::TransportError>(())
//! ```
//!
//! ## Architecture
//!
//! 1. **Common**: errors, endpoint options, messages, operation outcomes
//! 2. **Traits**: role interfaces (`Transport`, `Push`, `Pull`)
//! 3. **ZMQ**: context, endpoint registry, endpoints and role wrappers

pub mod common;
pub mod traits;
pub mod zmq;

pub use common::{
    sender_identity, EndpointOptions, EndpointRole, Message, RecvOutcome, SendOutcome,
    TransportError, TransportResult, WireFrame,
};

pub use traits::{Pull, Push, Transport};

pub use crate::zmq::{Endpoint, EndpointRegistry, TransportContext};

#[cfg(feature = "zmq-client")]
pub use crate::zmq::ZmqPush;

#[cfg(feature = "zmq-server")]
pub use crate::zmq::ZmqPull;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::*;
    pub use crate::traits::*;
    #[cfg(feature = "zmq-client")]
    pub use crate::zmq::client::*;
    #[cfg(feature = "zmq-server")]
    pub use crate::zmq::server::*;
    pub use crate::zmq::{Endpoint, EndpointRegistry, TransportContext};
}
