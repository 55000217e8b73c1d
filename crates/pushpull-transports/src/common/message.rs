//! Message and wire frame types
//!
//! Frames travel as JSON tagged by `kind`. Heartbeat frames are liveness
//! probes and never become [`Message`]s. Any other UTF-8 text that is not a
//! recognised frame is accepted as a raw payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{TransportError, TransportResult};

/// Sender label used when a raw frame carries no identity
pub const UNKNOWN_SENDER: &str = "unknown";

/// Identity of a sending worker as it appears on the wire,
/// e.g. `Pusher-3[PID:4242]`
pub fn sender_identity(worker_name: &str, pid: u32) -> String {
    format!("{}[PID:{}]", worker_name, pid)
}

/// One frame on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireFrame {
    /// A unit of work
    Task {
        sequence_id: u64,
        sender: String,
        payload: String,
        sent_at_ms: i64,
    },

    /// Liveness probe; counted by the receiver, never processed
    Heartbeat { sender: String, sent_at_ms: i64 },

    /// Plain text from a peer that does not speak the framed protocol
    #[serde(skip)]
    Raw { payload: String },
}

impl WireFrame {
    /// Task frame stamped with the current time
    pub fn task(sequence_id: u64, sender: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Task {
            sequence_id,
            sender: sender.into(),
            payload: payload.into(),
            sent_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Heartbeat frame stamped with the current time
    pub fn heartbeat(sender: impl Into<String>) -> Self {
        Self::Heartbeat {
            sender: sender.into(),
            sent_at_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat { .. })
    }

    /// Sender identity carried by the frame
    pub fn sender(&self) -> &str {
        match self {
            Self::Task { sender, .. } | Self::Heartbeat { sender, .. } => sender,
            Self::Raw { .. } => UNKNOWN_SENDER,
        }
    }

    /// Serialize to bytes. Raw frames are sent verbatim.
    pub fn encode(&self) -> TransportResult<Vec<u8>> {
        match self {
            Self::Raw { payload } => Ok(payload.as_bytes().to_vec()),
            framed => Ok(serde_json::to_vec(framed)?),
        }
    }

    /// Parse bytes received from the wire
    ///
    /// # Errors
    /// [`TransportError::InvalidMessage`] when the bytes are not UTF-8.
    pub fn decode(bytes: &[u8]) -> TransportResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TransportError::InvalidMessage(format!("payload is not UTF-8: {}", e)))?;

        match serde_json::from_str::<WireFrame>(text) {
            Ok(frame) => Ok(frame),
            Err(_) => Ok(Self::Raw {
                payload: text.to_string(),
            }),
        }
    }
}

/// A unit of work handed from intake to processing
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    sequence_id: u64,
    sender_identity: String,
    payload: String,
    enqueued_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sequence_id: u64,
        sender_identity: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            sender_identity: sender_identity.into(),
            payload: payload.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// Build from a decoded frame; heartbeats yield `None`
    pub fn from_frame(frame: WireFrame) -> Option<Self> {
        match frame {
            WireFrame::Task {
                sequence_id,
                sender,
                payload,
                ..
            } => Some(Self::new(sequence_id, sender, payload)),
            WireFrame::Raw { payload } => Some(Self::new(0, UNKNOWN_SENDER, payload)),
            WireFrame::Heartbeat { .. } => None,
        }
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn sender_identity(&self) -> &str {
        &self.sender_identity
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_frame_wire_format() {
        let frame = WireFrame::task(3, "Pusher-1[PID:42]", "Task 3");
        let json: serde_json::Value = serde_json::from_slice(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["kind"], "task");
        assert_eq!(json["sequence_id"], 3);
        assert_eq!(json["sender"], "Pusher-1[PID:42]");
        assert_eq!(json["payload"], "Task 3");
    }

    #[test]
    fn test_heartbeat_never_becomes_message() {
        let bytes = WireFrame::heartbeat("Pusher-1[PID:42]").encode().unwrap();
        let frame = WireFrame::decode(&bytes).unwrap();
        assert!(frame.is_heartbeat());
        assert_eq!(frame.sender(), "Pusher-1[PID:42]");
        assert!(Message::from_frame(frame).is_none());
    }

    #[test]
    fn test_plain_text_is_raw_payload() {
        let frame = WireFrame::decode(b"hello from netcat").unwrap();
        let message = Message::from_frame(frame).unwrap();
        assert_eq!(message.sequence_id(), 0);
        assert_eq!(message.sender_identity(), UNKNOWN_SENDER);
        assert_eq!(message.payload(), "hello from netcat");
    }

    #[test]
    fn test_non_utf8_is_rejected() {
        let err = WireFrame::decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidMessage(_)));
    }

    #[test]
    fn test_sender_identity_format() {
        assert_eq!(sender_identity("Pusher-7", 1234), "Pusher-7[PID:1234]");
    }
}
