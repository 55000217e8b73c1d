//! Common types and utilities shared by every endpoint role

pub mod config;
pub mod error;
pub mod message;
pub mod outcome;

pub use config::{EndpointOptions, EndpointRole};
pub use error::{TransportError, TransportResult};
pub use message::{sender_identity, Message, WireFrame};
pub use outcome::{RecvOutcome, SendOutcome};
