//! ZMQ PULL pattern (server-side push-pull)
//!
//! PULL sockets receive frames from any number of PUSH clients,
//! fair-queued across connections.

use std::time::Duration;

use crate::common::{EndpointOptions, EndpointRole, RecvOutcome, TransportError, TransportResult};
use crate::traits::{Pull, Transport};
use crate::zmq::{Endpoint, TransportContext};

/// ZMQ PULL socket implementation (receiver)
pub struct ZmqPull {
    context: TransportContext,
    address: String,
    options: EndpointOptions,
    endpoint: Option<Endpoint>,
}

impl ZmqPull {
    /// Create a PULL transport; nothing is bound until [`Transport::start`]
    pub fn new(context: TransportContext, address: impl Into<String>, options: EndpointOptions) -> Self {
        Self {
            context,
            address: address.into(),
            options,
            endpoint: None,
        }
    }

    /// Bound address once started (resolves ephemeral ports)
    pub fn resolved_address(&self) -> Option<&str> {
        self.endpoint.as_ref().map(Endpoint::resolved_address)
    }
}

impl Transport for ZmqPull {
    fn start(&mut self) -> TransportResult<()> {
        if self.endpoint.is_some() {
            return Err(TransportError::AlreadyRunning);
        }
        let endpoint = Endpoint::create(
            &self.context,
            EndpointRole::Pull,
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
        "zmq-pull"
    }
}

impl Pull for ZmqPull {
    fn pull(&self) -> RecvOutcome {
        self.pull_timeout(self.options.timeout())
    }

    fn pull_timeout(&self, timeout: Duration) -> RecvOutcome {
        match &self.endpoint {
            Some(endpoint) => endpoint.recv(timeout),
            None => RecvOutcome::Error(TransportError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_start_stop() {
        let context = TransportContext::new().unwrap();
        let mut pull = ZmqPull::new(context, "tcp://127.0.0.1:*", EndpointOptions::default());
        assert!(!pull.is_running());
        assert!(pull.resolved_address().is_none());

        pull.start().unwrap();
        assert!(pull.is_running());
        assert!(pull.pull_timeout(Duration::from_millis(10)).is_empty());

        pull.stop().unwrap();
        assert!(!pull.is_running());
        assert!(matches!(
            pull.pull_timeout(Duration::from_millis(10)),
            RecvOutcome::Error(TransportError::Closed)
        ));
    }
}
