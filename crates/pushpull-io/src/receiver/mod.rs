//! Receiving side: bound PULL endpoint, intake/processor loops, handlers

pub mod handler;
pub mod pipeline;
pub mod stats;

pub use handler::{HandlerError, LoggingHandler, MessageHandler};
pub use pipeline::{PipelineState, ReceiverPipeline};
pub use stats::{ReceiverReport, ReceiverStats};
