//! Message handlers for the processor loop

use std::thread;
use std::time::Duration;

use pushpull_transports::Message;
use tracing::{debug, info};

/// Error returned by a handler; counted and logged, never fatal
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Consumes messages popped from the receive queue
///
/// Runs on the processor thread only. Closures of the right shape are
/// handlers too.
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Message) -> Result<(), HandlerError> + Send + 'static,
{
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Default handler: logs each task and simulates work
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler {
    processing_delay: Duration,
}

impl LoggingHandler {
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }
}

impl MessageHandler for LoggingHandler {
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError> {
        info!(
            "[PROC] Processing task #{} from {}: {}",
            message.sequence_id(),
            message.sender_identity(),
            message.payload()
        );
        if !self.processing_delay.is_zero() {
            thread::sleep(self.processing_delay);
        }
        debug!(
            "[PROC] ✅ Done #{} from {} (queued at {})",
            message.sequence_id(),
            message.sender_identity(),
            message.enqueued_at().format("%H:%M:%S%.3f")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = |message: &Message| -> Result<(), HandlerError> {
                if message.payload().is_empty() {
                    return Err("empty payload".into());
                }
                Ok(())
            };
            seen.push(handler.handle(&Message::new(1, "Pusher-1[PID:1]", "Task 1")).is_ok());
            seen.push(handler.handle(&Message::new(2, "Pusher-1[PID:1]", "")).is_ok());
        }
        assert_eq!(seen, vec![true, false]);
    }

    #[test]
    fn test_logging_handler_succeeds() {
        let mut handler = LoggingHandler::new(Duration::ZERO);
        assert!(handler
            .handle(&Message::new(7, "Pusher-2[PID:1]", "Task 7"))
            .is_ok());
    }
}
