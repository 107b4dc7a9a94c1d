// Copyright (c) James Kassemi, SC, US. All rights reserved.
use log::warn;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Jittered exponential backoff for async operations.
///
/// The delay before attempt `k + 1` (after `k` failures) is
/// `base_delay_ms * 2^(k-1) * f`, with `f` drawn uniformly from
/// `[jitter_min, jitter_max)`, capped at `max_delay_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_min: f64,
        jitter_max: f64,
    ) -> Self {
        let clamped_attempts = max_attempts.max(1);
        let clamped_base = base_delay_ms.max(1);
        let clamped_max_delay = max_delay_ms.max(clamped_base);
        let clamped_min = jitter_min.max(0.0);
        let clamped_max = jitter_max.max(clamped_min);
        Self {
            max_attempts: clamped_attempts,
            base_delay_ms: clamped_base,
            max_delay_ms: clamped_max_delay,
            jitter_min: clamped_min,
            jitter_max: clamped_max,
        }
    }

    /// Ledger read policy: 5 attempts, 2s base, factor in `[0.5, 1.0)`.
    pub fn default_network() -> Self {
        Self::new(5, 2_000, 60_000, 0.5, 1.0)
    }

    /// Delay after `failures` consecutive failed attempts (`failures >= 1`).
    pub fn next_delay<R: Rng + ?Sized>(&self, failures: usize, rng: &mut R) -> Duration {
        let exp = 2_u64.saturating_pow(failures.saturating_sub(1) as u32);
        let nominal = self.base_delay_ms.saturating_mul(exp) as f64;
        let factor = if self.jitter_max > self.jitter_min {
            rng.gen_range(self.jitter_min..self.jitter_max)
        } else {
            self.jitter_min
        };
        let delay_ms = (nominal * factor).min(self.max_delay_ms as f64);
        Duration::from_secs_f64(delay_ms / 1_000.0)
    }

    pub async fn retry_async<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_with(op, |failures| self.next_delay(failures, &mut rand::thread_rng()), sleep)
            .await
    }

    /// Retry loop with injected delay and sleep sources. Attempts run strictly
    /// one after another; the last error is returned as-is once the budget is spent.
    pub async fn retry_with<F, Fut, T, E, D, S, SFut>(
        &self,
        mut op: F,
        mut delay_for: D,
        mut sleeper: S,
    ) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        D: FnMut(usize) -> Duration,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            "attempt {}/{} failed, giving up: {}",
                            attempt, self.max_attempts, err
                        );
                        return Err(err);
                    }
                    let delay = delay_for(attempt);
                    warn!(
                        "attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.max_attempts, err, delay
                    );
                    sleeper(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_network()
    }
}
