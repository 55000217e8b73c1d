//! ZMQ server-side socket patterns

pub mod pull;

pub use pull::ZmqPull;
