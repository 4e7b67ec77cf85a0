//! Fixed-delay, bounded-attempt retry.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Terminal failure of a retried step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; `last` is the error of the final attempt.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Retry a step with a fixed delay between attempts.
///
/// Attempts are counted by an explicit loop, so the exhausted condition is a single exit
/// and no stack grows with the attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffRetrier {
    interval: Duration,
    max_attempts: u32,
}

impl Default for BackoffRetrier {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

impl BackoffRetrier {
    /// `max_attempts` is clamped to at least one attempt.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-indexed attempt number. Each failure is logged with the number
    /// of attempts left; the retrier sleeps `interval` only when another attempt follows.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let remaining = self.max_attempts - attempt;
                    warn!(
                        step = what,
                        attempt,
                        remaining,
                        wait_ms = self.interval.as_millis() as u64,
                        error = %e,
                        "step failed"
                    );
                    if remaining == 0 {
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
