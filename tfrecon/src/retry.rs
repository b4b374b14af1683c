//! Exponential backoff for transient remote failures

use crate::context::Context;
use crate::error::{Result, TfreconError};
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry settings for throttled and transport failures.
/// Attempt `n` (1-based) waits `initial_backoff_ms * 2^(n-1)`, capped at
/// `max_backoff_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all, useful in tests that count remote calls
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(std::cmp::min(
            self.initial_backoff_ms.saturating_mul(factor),
            self.max_backoff_ms,
        ))
    }

    /// Runs `request_fn` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up. Cancellation of `ctx` while backing off
    /// reports a timeout.
    pub async fn run<F, Fut, T>(&self, ctx: &Context, operation: &str, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let backoff = self.backoff(attempt);
                tracing::debug!(
                    "Retrying {} after {}ms (attempt {})",
                    operation,
                    backoff.as_millis(),
                    attempt
                );
                if !ctx.sleep(backoff).await {
                    return Err(TfreconError::Timeout {
                        operation: operation.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            }

            match request_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempt >= self.max_retries {
                        tracing::error!("{} failed after {} attempts: {}", operation, attempt + 1, e);
                        return Err(TfreconError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(e),
                        });
                    }
                    tracing::warn!("{} failed with a retryable error: {}", operation, e);
                }
                Err(e) => return Err(e),
            }

            attempt += 1;
        }
    }
}
