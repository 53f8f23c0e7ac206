//! Backoff for store reads.
//!
//! Only reads of `check_ins` and `profiles` go through [`ReadRetry`]. An
//! insert whose response was lost may already be stored, and sending it again
//! would hit the one-check-in-per-day constraint, so inserts are sent once.

use std::future::Future;
use std::time::Duration;

use crate::error::ServiceError;

/// Retry policy for idempotent reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRetry {
    /// Retries after the first attempt
    retries: u32,
    base: Duration,
    cap: Duration,
}

impl Default for ReadRetry {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_secs(5))
    }
}

impl ReadRetry {
    pub fn new(retries: u32, base: Duration, cap: Duration) -> Self {
        Self { retries, base, cap }
    }

    /// Wait before retry number `retry` (0-based): `base * 2^retry`, capped
    fn backoff(&self, retry: u32) -> Duration {
        self.base
            .saturating_mul(1u32 << retry.min(20))
            .min(self.cap)
    }

    /// Run `read` until it succeeds, fails permanently, or retries run out.
    ///
    /// `what` names the read in logs, e.g. "recent check-ins".
    pub async fn run<T, F, Fut>(&self, what: &str, mut read: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut retry = 0;
        loop {
            match read().await {
                Ok(value) => {
                    if retry > 0 {
                        tracing::debug!("Read of {} succeeded after {} retries", what, retry);
                    }
                    return Ok(value);
                }
                Err(e) if retry < self.retries && e.is_transient() => {
                    let delay = self.backoff(retry);
                    tracing::warn!(
                        "Read of {} failed ({}); retry {}/{} in {:?}",
                        what,
                        e,
                        retry + 1,
                        self.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if retry > 0 {
                        tracing::error!("Read of {} failed after {} retries: {}", what, retry, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
