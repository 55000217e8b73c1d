//! Retry logic with exponential backoff
//!
//! Backoff sleeps go through the shutdown context, so a stop request cuts
//! any pending retry short.

use std::fmt::Display;
use std::time::Duration;

use pushpull_transports::TransportError;
use tracing::{info, warn};

use crate::shutdown::ShutdownContext;

/// Errors that may succeed if the operation is repeated
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        TransportError::is_retryable(self)
    }
}

/// Reconnection strategy with exponential backoff
#[derive(Debug, Clone)]
pub struct ReconnectionStrategy {
    /// Base backoff in milliseconds
    base_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    max_backoff_ms: u64,

    /// Retries performed so far
    retries: u32,

    /// Maximum attempts including the first one (0 = infinite)
    max_attempts: u32,
}

impl ReconnectionStrategy {
    /// Create a new reconnection strategy
    ///
    /// # Arguments
    /// * `base_backoff` - Wait before the first retry
    /// * `max_attempts` - Total attempts including the first (0 = infinite)
    pub fn new(base_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            base_backoff_ms: base_backoff.as_millis() as u64,
            max_backoff_ms: 60_000, // Cap at 60 seconds
            retries: 0,
            max_attempts,
        }
    }

    /// Get next backoff duration with exponential increase
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.retries += 1;

        // base * 2^(retry - 1)
        let exp = 2u64.saturating_pow(self.retries - 1);
        let backoff_ms = self.base_backoff_ms.saturating_mul(exp).min(self.max_backoff_ms);

        Some(Duration::from_millis(backoff_ms))
    }

    /// Attempt currently in progress, starting at 1
    pub fn attempt_number(&self) -> u32 {
        self.retries + 1
    }

    /// Retries performed so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check if attempts exhausted
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts > 0 && self.retries + 1 >= self.max_attempts
    }
}

/// Why a retried operation gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("non-retryable failure: {0}")]
    Fatal(#[source] E),

    #[error("interrupted by shutdown after {attempts} attempts")]
    Interrupted { attempts: u32 },
}

/// Execute a retryable operation with interruptible exponential backoff
///
/// The closure receives the 1-based attempt number.
///
/// # Example
/// ```ignore
/// let mut strategy = ReconnectionStrategy::new(Duration::from_secs(1), 2);
/// retry_with_backoff(|_| connect(), &mut strategy, "Pusher-1 connect", &shutdown)?;
/// ```
pub fn retry_with_backoff<F, T, E>(
    mut operation: F,
    strategy: &mut ReconnectionStrategy,
    operation_name: &str,
    shutdown: &ShutdownContext,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: std::error::Error + Retryable + Display + 'static,
{
    loop {
        if shutdown.is_stopping() {
            return Err(RetryError::Interrupted {
                attempts: strategy.retries(),
            });
        }

        match operation(strategy.attempt_number()) {
            Ok(result) => {
                if strategy.retries() > 0 {
                    info!(
                        "[RECONNECT] ✓ {} succeeded after {} attempts",
                        operation_name,
                        strategy.attempt_number()
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() => {
                let attempt = strategy.attempt_number();
                if let Some(backoff) = strategy.next_backoff() {
                    warn!(
                        "[RECONNECT] ⚠ {} failed (attempt {}): {} - retrying in {:?}",
                        operation_name, attempt, e, backoff
                    );
                    if shutdown.wait_timeout(backoff) {
                        return Err(RetryError::Interrupted { attempts: attempt });
                    }
                } else {
                    warn!(
                        "[RECONNECT] ✗ {} failed after {} attempts - giving up",
                        operation_name, attempt
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
}
