//! Bounded retry with linear backoff, and substitution of a deterministic
//! default once every attempt has failed. Used per swatch and per mode.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Base delay; the wait after attempt `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// A fallible, repeatable unit of work.
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;

    /// Short label for log lines.
    fn describe(&self) -> String;

    async fn run(&mut self) -> anyhow::Result<Self::Output>;
}

/// Every attempt failed.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub last_error: anyhow::Error,
}

/// A value and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sourced<T> {
    Live(T),
    Fallback(T),
}

impl<T> Sourced<T> {
    pub fn is_live(&self) -> bool {
        matches!(self, Sourced::Live(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Sourced::Live(value) | Sourced::Fallback(value) => value,
        }
    }

    /// Use `value` when present, otherwise the deterministic default.
    pub fn or_fallback(value: Option<T>, fallback: impl FnOnce() -> T) -> Self {
        match value {
            Some(value) => Sourced::Live(value),
            None => Sourced::Fallback(fallback()),
        }
    }
}

/// Run `op` up to `policy.attempts` times (at least once), sleeping
/// `backoff * n` after the n-th failure.
pub async fn attempt<A: Attempt>(policy: &RetryPolicy, op: &mut A) -> Result<A::Output, Exhausted> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for n in 1..=attempts {
        match op.run().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(
                    what = %op.describe(),
                    attempt = n,
                    of = attempts,
                    error = %err,
                    "attempt failed"
                );
                last_error = Some(err);
                if n < attempts {
                    tokio::time::sleep(policy.delay_after(n)).await;
                }
            }
        }
    }

    Err(Exhausted {
        attempts,
        last_error: last_error.unwrap_or_else(|| anyhow!("no attempt was made")),
    })
}

/// [`attempt`], substituting `fallback` once the attempts are exhausted.
pub async fn attempt_or<A, F>(policy: &RetryPolicy, op: &mut A, fallback: F) -> Sourced<A::Output>
where
    A: Attempt,
    F: FnOnce() -> A::Output,
{
    match attempt(policy, op).await {
        Ok(value) => Sourced::Live(value),
        Err(exhausted) => {
            tracing::warn!(
                what = %op.describe(),
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "falling back to synthesized values"
            );
            Sourced::Fallback(fallback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails until `succeed_on`, counting calls.
    struct Flaky {
        calls: u32,
        succeed_on: u32,
    }

    #[async_trait]
    impl Attempt for Flaky {
        type Output = u32;

        fn describe(&self) -> String {
            "flaky".to_string()
        }

        async fn run(&mut self) -> anyhow::Result<u32> {
            self.calls += 1;
            if self.calls >= self.succeed_on {
                Ok(self.calls)
            } else {
                Err(anyhow!("call {} failed", self.calls))
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_retries() {
        let mut op = Flaky {
            calls: 0,
            succeed_on: 3,
        };
        let started = tokio::time::Instant::now();
        let value = attempt(&policy(), &mut op).await.unwrap();
        assert_eq!(value, 3);
        // linear backoff: 100ms after the first failure, 200ms after the second
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_and_reports_last_error() {
        let mut op = Flaky {
            calls: 0,
            succeed_on: u32::MAX,
        };
        let err = attempt(&policy(), &mut op).await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(op.calls, 3);
        assert!(err.last_error.to_string().contains("call 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let mut op = Flaky {
            calls: 0,
            succeed_on: 1,
        };
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(attempt(&policy, &mut op).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_or_substitutes_default() {
        let mut op = Flaky {
            calls: 0,
            succeed_on: u32::MAX,
        };
        let out = attempt_or(&policy(), &mut op, || 42).await;
        assert_eq!(out, Sourced::Fallback(42));
        assert!(!out.is_live());
        assert_eq!(out.into_inner(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_or_keeps_live_value() {
        let mut op = Flaky {
            calls: 0,
            succeed_on: 1,
        };
        let out = attempt_or(&policy(), &mut op, || 42).await;
        assert_eq!(out, Sourced::Live(1));
    }

    #[test]
    fn or_fallback_only_calls_default_when_missing() {
        assert_eq!(Sourced::or_fallback(Some(1), || 2), Sourced::Live(1));
        assert_eq!(Sourced::or_fallback(None, || 2), Sourced::Fallback(2));
    }
}
