//! Caller-side polling policy.
//!
//! Nothing in the session client retries on its own. Callers that want to
//! wait for a QR or for an engine to come back wrap their calls in a
//! [`RetryPolicy`].

use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub interval: Duration,
    /// Fraction of `interval` to randomize by, in `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(3),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the next attempt: `interval` ± `jitter`.
    pub fn delay(&self) -> Duration {
        // NaN and out-of-range values set on the public field fall back to
        // the nearest valid jitter
        let jitter = if self.jitter.is_nan() {
            0.0
        } else {
            self.jitter.clamp(0.0, 1.0)
        };
        if jitter == 0.0 {
            return self.interval;
        }
        let base = self.interval.as_secs_f64();
        let spread = base * jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((base + offset).max(0.0))
    }

    /// Run `op` until it succeeds, fails with a non-retryable kind, or the
    /// attempts run out. The last error is returned.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if retryable(&e) && attempt + 1 < self.max_attempts => {
                    let delay = self.delay();
                    debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn retryable(err: &Error) -> bool {
    err.kind().is_retryable()
}
