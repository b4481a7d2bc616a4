//! Bounded retry with a fixed or exponential delay.
//!
//! The policy only decides *when* to try again. What a failure means to the
//! user (a warning toast, a log line, nothing) is left to the caller, which
//! inspects the returned [`Attempted`] value.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep(delay_before(2)) ──▶ attempt 2 ──fail──▶ … ──▶ give up
//!     │                                              │
//!     └──ok──▶ done                                  └──ok──▶ done
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same wait before every retry.
    Fixed(Duration),
    /// `base * 2^(retry-1)`: base, 2×base, 4×base, …
    Exponential { base: Duration },
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Final result: the first success, or the last error.
    pub result: Result<T, E>,
    /// Number of times the operation was invoked (≥ 1).
    pub attempts: u32,
}

impl RetryPolicy {
    /// A policy that invokes the operation at most `max_attempts` times (min 1).
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait inserted before the given 1-indexed attempt. Zero for attempt 1.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base } => {
                let shift = (attempt - 2).min(16);
                base.saturating_mul(1u32 << shift)
            }
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-indexed attempt number. Attempts never overlap:
    /// each future is awaited to completion before the next one is created.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Attempted<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt >= self.max_attempts => {
                    debug!("attempt {}/{} failed, giving up: {}", attempt, self.max_attempts, e);
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    debug!("attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_schedule() {
        let p = RetryPolicy::new(
            4,
            Backoff::Exponential {
                base: Duration::from_millis(500),
            },
        );
        assert_eq!(p.delay_before(1), Duration::ZERO);
        assert_eq!(p.delay_before(2), Duration::from_millis(500));
        assert_eq!(p.delay_before(3), Duration::from_millis(1000));
        assert_eq!(p.delay_before(4), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let p = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(1)));
        let out = p
            .run(|n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("down")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(out.attempts, 2);
        assert_eq!(out.result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_with_fixed_waits() {
        let p = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(1)));
        let start = tokio::time::Instant::now();
        let out: Attempted<(), &str> = p.run(|_| async { Err("down") }).await;
        assert_eq!(out.attempts, 3);
        assert!(out.result.is_err());
        // Two waits: between 1→2 and 2→3.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO)).max_attempts(), 1);
        assert_eq!(RetryPolicy::once().max_attempts(), 1);
    }
}
