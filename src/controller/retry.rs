//! Bounded retry for transient ledger failures

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

/// Jittered exponential backoff, applied only to transient errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: usize,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Random spread applied to each delay, 0.0..=1.0
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10), Duration::from_millis(200), 0.2)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration, jitter_pct: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// A policy that tries exactly once
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 0.0)
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u32.saturating_pow(attempt as u32);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        if self.jitter_pct == 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_secs_f64() * self.jitter_pct;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + delta).max(0.0))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Permanent errors are returned as-is. Running out of attempts on a
    /// transient error yields [`Error::RetriesExhausted`].
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    let delay = self.next_delay(attempt - 1);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient ledger failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
