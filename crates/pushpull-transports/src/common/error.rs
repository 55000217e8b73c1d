//! Common error types for all transports

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport error type
///
/// Timeouts and "no data" are not errors on the hot paths: see
/// [`crate::SendOutcome`] and [`crate::RecvOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to initialize the transport context
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Endpoint address could not be parsed
    #[error("Invalid address '{0}': expected tcp://<host>:<port>, ipc://<path> or inproc://<name>")]
    InvalidAddress(String),

    /// Failed to bind server socket (address unavailable, port in use)
    #[error("Bind to {address} failed: {reason}")]
    BindFailed { address: String, reason: String },

    /// Failed to connect client socket
    #[error("Connect to {address} failed: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Failed to send message
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive message
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Timeout occurred
    #[error("Operation timed out")]
    Timeout,

    /// Endpoint has been closed (or was never started)
    #[error("Endpoint is closed")]
    Closed,

    /// Transport is already running
    #[error("Transport is already running")]
    AlreadyRunning,

    /// Operation not supported by this endpoint role
    #[error("{operation} is not supported on a {role} endpoint")]
    WrongRole {
        operation: &'static str,
        role: crate::EndpointRole,
    },

    /// The shared transport context was terminated underneath the endpoint
    #[error("Transport context was terminated")]
    ContextTerminated,

    /// Context termination refused while endpoints are still open
    #[error("{0} endpoint(s) still open; transport context not terminated")]
    EndpointsStillOpen(usize),

    /// Context is still shared by other owners
    #[error("Transport context still referenced elsewhere; termination deferred")]
    ContextInUse,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Message too large
    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    /// Invalid message format
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// ZMQ library error
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zmq::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::SendFailed(_) | Self::ReceiveFailed(_) => true,
            Self::Zmq(e) => matches!(e, zmq::Error::EAGAIN | zmq::Error::EINTR),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Zmq(zmq::Error::EAGAIN).is_retryable());
        assert!(!TransportError::Closed.is_retryable());
        assert!(!TransportError::ContextTerminated.is_retryable());
        assert!(!TransportError::Zmq(zmq::Error::ETERM).is_retryable());
    }

    #[test]
    fn test_bind_failure_message() {
        let bind = TransportError::BindFailed {
            address: "tcp://*:5560".to_string(),
            reason: "Address already in use".to_string(),
        };
        assert!(!bind.is_retryable());
        assert_eq!(
            bind.to_string(),
            "Bind to tcp://*:5560 failed: Address already in use"
        );
    }
}
