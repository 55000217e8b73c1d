//! ZMQ client-side socket patterns

pub mod push;

pub use push::ZmqPush;
