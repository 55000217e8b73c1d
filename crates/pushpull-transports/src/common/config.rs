//! Endpoint configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Role of an endpoint, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// Connects and sends
    Push,
    /// Binds and receives
    Pull,
}

impl EndpointRole {
    pub(crate) fn socket_type(self) -> zmq::SocketType {
        match self {
            EndpointRole::Push => zmq::PUSH,
            EndpointRole::Pull => zmq::PULL,
        }
    }

    /// Log tag, e.g. `ZMQ-PUSH`
    pub fn tag(self) -> &'static str {
        match self {
            EndpointRole::Push => "ZMQ-PUSH",
            EndpointRole::Pull => "ZMQ-PULL",
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Push => write!(f, "push"),
            EndpointRole::Pull => write!(f, "pull"),
        }
    }
}

/// Socket options recognised by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOptions {
    /// Max wait per send/receive operation
    pub timeout_ms: u64,

    /// Drain grace period for pending outbound messages on close
    pub linger_ms: u64,

    /// Receive returns immediately when nothing is queued
    pub nonblocking: bool,

    /// High water mark for send buffer (0 = unlimited)
    pub send_hwm: usize,

    /// High water mark for receive buffer (0 = unlimited)
    pub recv_hwm: usize,

    /// Maximum message size (None = unlimited)
    pub max_message_size: Option<usize>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            linger_ms: 1000,
            nonblocking: false,
            send_hwm: 1000,
            recv_hwm: 1000,
            max_message_size: Some(10 * 1024 * 1024), // 10 MB default
        }
    }
}

impl EndpointOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger_ms = linger.as_millis() as u64;
        self
    }

    /// Set no linger (immediate close, pending messages discarded)
    pub fn with_no_linger(mut self) -> Self {
        self.linger_ms = 0;
        self
    }

    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms > i32::MAX as u64 {
            return Err(format!("timeout_ms {} exceeds {}", self.timeout_ms, i32::MAX));
        }
        if self.linger_ms > i32::MAX as u64 {
            return Err(format!("linger_ms {} exceeds {}", self.linger_ms, i32::MAX));
        }
        if self.send_hwm > i32::MAX as usize {
            return Err(format!("send_hwm {} exceeds {}", self.send_hwm, i32::MAX));
        }
        if self.recv_hwm > i32::MAX as usize {
            return Err(format!("recv_hwm {} exceeds {}", self.recv_hwm, i32::MAX));
        }
        if let Some(max_size) = self.max_message_size {
            if max_size == 0 {
                return Err("Maximum message size must be greater than 0".to_string());
            }
            if i64::try_from(max_size).is_err() {
                return Err(format!("max_message_size {} exceeds {}", max_size, i64::MAX));
            }
        }
        Ok(())
    }
}

/// Check that an address is one ZMQ can bind/connect
///
/// `tcp://` addresses need a host and a numeric port (or `*` for an
/// ephemeral bind port).
pub(crate) fn validate_address(address: &str) -> Result<(), String> {
    let (scheme, rest) = address
        .split_once("://")
        .ok_or_else(|| "missing scheme".to_string())?;

    match scheme {
        "tcp" => {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| "missing port".to_string())?;
            if host.is_empty() {
                return Err("missing host".to_string());
            }
            if port != "*" && port.parse::<u16>().is_err() {
                return Err(format!("invalid port '{}'", port));
            }
            Ok(())
        }
        "ipc" | "inproc" if !rest.is_empty() => Ok(()),
        "ipc" | "inproc" => Err("missing name".to_string()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(validate_address("tcp://*:5560").is_ok());
        assert!(validate_address("tcp://localhost:5560").is_ok());
        assert!(validate_address("tcp://127.0.0.1:*").is_ok());
        assert!(validate_address("inproc://workers").is_ok());

        assert!(validate_address("localhost:5560").is_err());
        assert!(validate_address("tcp://localhost").is_err());
        assert!(validate_address("tcp://:5560").is_err());
        assert!(validate_address("tcp://localhost:99999").is_err());
        assert!(validate_address("udp://localhost:5560").is_err());
        assert!(validate_address("inproc://").is_err());
    }

    #[test]
    fn test_options_builder_and_validation() {
        let options = EndpointOptions::default()
            .with_timeout(Duration::from_millis(250))
            .with_no_linger()
            .with_nonblocking(true);
        assert_eq!(options.timeout_ms, 250);
        assert_eq!(options.linger(), Duration::ZERO);
        assert!(options.nonblocking);
        assert!(options.validate().is_ok());

        let mut bad = EndpointOptions::default();
        bad.max_message_size = Some(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_values_beyond_socket_range_rejected() {
        let hwm = EndpointOptions {
            send_hwm: i32::MAX as usize + 1,
            ..EndpointOptions::default()
        };
        assert!(hwm.validate().unwrap_err().contains("send_hwm"));

        let hwm = EndpointOptions {
            recv_hwm: usize::MAX,
            ..EndpointOptions::default()
        };
        assert!(hwm.validate().unwrap_err().contains("recv_hwm"));

        let size = EndpointOptions {
            max_message_size: Some(usize::MAX),
            ..EndpointOptions::default()
        };
        assert!(size.validate().unwrap_err().contains("max_message_size"));

        let edge = EndpointOptions {
            send_hwm: i32::MAX as usize,
            recv_hwm: i32::MAX as usize,
            ..EndpointOptions::default()
        };
        assert!(edge.validate().is_ok());
    }
}
