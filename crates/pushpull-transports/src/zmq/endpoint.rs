// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! Managed ZMQ endpoint
//!
//! Wraps one PUSH or PULL socket with validated options, timeout-aware
//! send/receive and idempotent close. An endpoint is owned by exactly one
//! thread at a time (`Send`, not `Sync`).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::context::{EndpointRegistry, TransportContext};
use crate::common::config::validate_address;
use crate::common::{
    EndpointOptions, EndpointRole, RecvOutcome, SendOutcome, TransportError, TransportResult,
};

/// One open (or closed) ZMQ socket bound to a role
pub struct Endpoint {
    role: EndpointRole,
    address: String,
    resolved_address: String,
    options: EndpointOptions,
    socket: Option<zmq::Socket>,
    registry: Arc<EndpointRegistry>,
    id: u64,
}

impl Endpoint {
    /// Create an endpoint: PULL binds, PUSH connects
    ///
    /// PUSH endpoints set `ZMQ_IMMEDIATE`, so messages are only queued to
    /// completed connections and a send with no receiver times out.
    ///
    /// # Errors
    /// - [`TransportError::InvalidAddress`] / [`TransportError::InvalidConfig`]
    /// - [`TransportError::BindFailed`] (e.g. port already in use)
    /// - [`TransportError::ConnectFailed`]
    pub fn create(
        context: &TransportContext,
        role: EndpointRole,
        address: &str,
        options: EndpointOptions,
    ) -> TransportResult<Self> {
        options.validate().map_err(TransportError::InvalidConfig)?;
        validate_address(address)
            .map_err(|reason| TransportError::InvalidAddress(format!("{} ({})", address, reason)))?;

        let socket = context.zmq().socket(role.socket_type()).map_err(|e| match e {
            zmq::Error::ETERM => TransportError::ContextTerminated,
            other => TransportError::InitializationFailed(other.to_string()),
        })?;

        Self::apply_options(&socket, role, &options)?;

        let resolved_address = match role {
            EndpointRole::Pull => {
                socket.bind(address).map_err(|e| TransportError::BindFailed {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
                match socket.get_last_endpoint() {
                    Ok(Ok(endpoint)) => endpoint,
                    _ => address.to_string(),
                }
            }
            EndpointRole::Push => {
                socket
                    .connect(address)
                    .map_err(|e| TransportError::ConnectFailed {
                        address: address.to_string(),
                        reason: e.to_string(),
                    })?;
                address.to_string()
            }
        };

        let registry = context.registry_handle();
        let id = registry.register(role, &resolved_address);

        match role {
            EndpointRole::Pull => info!("🦀 [{}] Listening on {}", role.tag(), resolved_address),
            EndpointRole::Push => debug!("[{}] Connecting to {}", role.tag(), resolved_address),
        }

        Ok(Self {
            role,
            address: address.to_string(),
            resolved_address,
            options,
            socket: Some(socket),
            registry,
            id,
        })
    }

    fn apply_options(
        socket: &zmq::Socket,
        role: EndpointRole,
        options: &EndpointOptions,
    ) -> TransportResult<()> {
        // Ranges are checked by EndpointOptions::validate
        let timeout_ms = options.timeout_ms as i32;
        socket.set_linger(options.linger_ms as i32)?;

        match role {
            EndpointRole::Push => {
                socket.set_sndhwm(options.send_hwm as i32)?;
                socket.set_sndtimeo(timeout_ms)?;
                socket.set_immediate(true)?;
            }
            EndpointRole::Pull => {
                socket.set_rcvhwm(options.recv_hwm as i32)?;
                socket.set_rcvtimeo(timeout_ms)?;
                if let Some(max_size) = options.max_message_size {
                    socket.set_maxmsgsize(max_size as i64)?;
                }
            }
        }
        Ok(())
    }

    fn socket(&self) -> TransportResult<&zmq::Socket> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }

    /// Send one frame
    ///
    /// A zero timeout (or a non-blocking endpoint) never waits and reports
    /// [`SendOutcome::WouldBlock`] when the frame cannot be queued.
    ///
    /// # Errors
    /// Only for conditions a retry cannot fix: closed endpoint, wrong role,
    /// oversized frame, terminated context.
    pub fn send(&self, data: &[u8], timeout: Duration) -> TransportResult<SendOutcome> {
        if self.role != EndpointRole::Push {
            return Err(TransportError::WrongRole {
                operation: "send",
                role: self.role,
            });
        }
        let socket = self.socket()?;

        if let Some(max_size) = self.options.max_message_size {
            if data.len() > max_size {
                return Err(TransportError::MessageTooLarge {
                    size: data.len(),
                    max_size,
                });
            }
        }

        let dontwait = self.options.nonblocking || timeout.is_zero();
        let flags = if dontwait {
            zmq::DONTWAIT
        } else {
            socket.set_sndtimeo(clamp_ms(timeout))?;
            0
        };

        match socket.send(data, flags) {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(zmq::Error::EAGAIN) if dontwait => Ok(SendOutcome::WouldBlock),
            Err(zmq::Error::EAGAIN) => Ok(SendOutcome::Timeout),
            Err(zmq::Error::EINTR) => Ok(SendOutcome::WouldBlock),
            Err(zmq::Error::ETERM) => Err(TransportError::ContextTerminated),
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }

    /// Receive one frame, waiting at most `timeout`
    ///
    /// A non-blocking endpoint never waits: it returns [`RecvOutcome::Empty`]
    /// at once when nothing is queued, whatever `timeout` says.
    pub fn recv(&self, timeout: Duration) -> RecvOutcome {
        if self.role != EndpointRole::Pull {
            return RecvOutcome::Error(TransportError::WrongRole {
                operation: "recv",
                role: self.role,
            });
        }
        let socket = match self.socket() {
            Ok(socket) => socket,
            Err(e) => return RecvOutcome::Error(e),
        };

        if !self.options.nonblocking && !timeout.is_zero() {
            match socket.poll(zmq::POLLIN, clamp_ms(timeout) as i64) {
                Ok(0) => return RecvOutcome::Empty,
                Ok(_) => {}
                Err(zmq::Error::EINTR) => return RecvOutcome::Empty,
                Err(zmq::Error::ETERM) => {
                    return RecvOutcome::Error(TransportError::ContextTerminated)
                }
                Err(e) => return RecvOutcome::Error(TransportError::ReceiveFailed(e.to_string())),
            }
        }

        match socket.recv_bytes(zmq::DONTWAIT) {
            Ok(bytes) => RecvOutcome::Received(bytes),
            Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => RecvOutcome::Empty,
            Err(zmq::Error::ETERM) => RecvOutcome::Error(TransportError::ContextTerminated),
            Err(e) => RecvOutcome::Error(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    /// Wait until a send would not block
    ///
    /// With `ZMQ_IMMEDIATE` set this only becomes true once a receiver has
    /// accepted the connection, which makes it usable as a connect probe.
    pub fn wait_writable(&self, timeout: Duration) -> TransportResult<bool> {
        let socket = self.socket()?;
        match socket.poll(zmq::POLLOUT, clamp_ms(timeout) as i64) {
            Ok(ready) => Ok(ready > 0),
            Err(zmq::Error::EINTR) => Ok(false),
            Err(zmq::Error::ETERM) => Err(TransportError::ContextTerminated),
            Err(e) => Err(TransportError::Zmq(e)),
        }
    }

    /// Close the socket; later calls are no-ops
    ///
    /// Pending outbound frames get at most `linger_ms` to drain.
    pub fn close(&mut self) {
        self.close_with_linger(self.options.linger())
    }

    /// Close with an explicit linger, e.g. zero to discard pending frames
    pub fn close_with_linger(&mut self, linger: Duration) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        if let Err(e) = socket.set_linger(clamp_ms(linger)) {
            warn!("[{}] Failed to set linger on close: {}", self.role.tag(), e);
        }
        drop(socket);
        self.registry.deregister(self.id);
        debug!("[{}] Closed {}", self.role.tag(), self.resolved_address);
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn role(&self) -> EndpointRole {
        self.role
    }

    /// Address as requested at creation
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Actual address; differs from [`Self::address`] after an ephemeral bind
    pub fn resolved_address(&self) -> &str {
        &self.resolved_address
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("role", &self.role)
            .field("address", &self.resolved_address)
            .field("open", &self.is_open())
            .finish()
    }
}

fn clamp_ms(duration: Duration) -> i32 {
    duration.as_millis().min(i32::MAX as u128) as i32
}
