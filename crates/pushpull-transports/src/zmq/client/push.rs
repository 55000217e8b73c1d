// Copyright 2025 pushpull contributors
// SPDX-License-Identifier: Apache-2.0

//! ZMQ PUSH pattern (client-side push-pull)
//!
//! PUSH sockets distribute frames to connected PULL servers.
//! Messages are load-balanced across connected servers.

use std::time::Duration;

use crate::common::{EndpointOptions, EndpointRole, SendOutcome, TransportError, TransportResult};
use crate::traits::{Push, Transport};
use crate::zmq::{Endpoint, TransportContext};

/// ZMQ PUSH socket implementation (sender)
pub struct ZmqPush {
    context: TransportContext,
    address: String,
    options: EndpointOptions,
    endpoint: Option<Endpoint>,
}

impl ZmqPush {
    /// Create a PUSH transport; nothing is connected until [`Transport::start`]
    pub fn new(context: TransportContext, address: impl Into<String>, options: EndpointOptions) -> Self {
        Self {
            context,
            address: address.into(),
            options,
            endpoint: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn endpoint(&self) -> TransportResult<&Endpoint> {
        self.endpoint.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for ZmqPush {
    fn start(&mut self) -> TransportResult<()> {
        if self.endpoint.is_some() {
            return Err(TransportError::AlreadyRunning);
        }
        let endpoint = Endpoint::create(
            &self.context,
            EndpointRole::Push,
            &self.address,
            self.options.clone(),
        )?;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    fn stop(&mut self) -> TransportResult<()> {
        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.close();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.endpoint.as_ref().map_or(false, Endpoint::is_open)
    }

    fn transport_type(&self) -> &str {
        "zmq-push"
    }
}

impl Push for ZmqPush {
    fn push(&self, data: &[u8]) -> TransportResult<SendOutcome> {
        self.push_timeout(data, self.options.timeout())
    }

    fn push_timeout(&self, data: &[u8], timeout: Duration) -> TransportResult<SendOutcome> {
        self.endpoint()?.send(data, timeout)
    }

    fn wait_ready(&self, timeout: Duration) -> TransportResult<bool> {
        self.endpoint()?.wait_writable(timeout)
    }
}
