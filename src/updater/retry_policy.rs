//! Retry policy for bundle downloads.
//!
//! Fixed attempt budget with a constant delay between attempts.

use std::time::Duration;

use super::errors::TransportError;

/// Retry policy with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Check if another attempt should be made after `attempt` (1-based) failed.
    ///
    /// Every transport failure is retryable; only the attempt budget matters.
    pub fn should_retry(&self, _error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// Returns the last error when every attempt failed.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(&e, attempt) => {
                    tracing::debug!(
                        "Attempt {}/{} failed: {}, retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delay: Duration::from_secs(1),
        }
    }
}
