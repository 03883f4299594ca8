//! Bounded retry with exponential backoff.
//!
//! Both network-bound pipeline stages (transcription and note formatting)
//! share the same policy: 3 attempts, 5 s base delay, delays doubling
//! between attempts (5 s, 10 s) and no delay after the final attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.base_delay_seconds),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retrying after the given 1-indexed attempt:
    /// `base_delay * 2^(attempt - 1)`, no jitter.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds or `max_attempts` is exhausted, sleeping
    /// between attempts. `on_retry` receives a progress message before each
    /// backoff sleep so the caller can surface it to an observer. The last
    /// captured error is returned once attempts run out.
    pub async fn run<T, E, F, Fut, C>(&self, label: &str, mut op: F, mut on_retry: C) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        C: FnMut(&str),
    {
        // A zero-attempt policy still runs the operation once.
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.delay_after(attempt);
                        let message = format!(
                            "{} failed (attempt {}/{}). Retrying in {}s...",
                            label,
                            attempt,
                            max_attempts,
                            delay.as_secs()
                        );
                        warn!("{}: {}", message, e);
                        on_retry(&message);
                        last_error = Some(e);
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            "{} failed on final attempt {}/{}: {}",
                            label, attempt, max_attempts, e
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error.expect("at least one attempt always runs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delay_sequence() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_secs(5));
        assert_eq!(p.delay_after(2), Duration::from_secs(10));
        assert_eq!(p.delay_after(3), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let mut messages = Vec::new();

        let started = tokio::time::Instant::now();
        let result: Result<u32, anyhow::Error> = policy()
            .run(
                "Transcription",
                move || {
                    let calls = calls_op.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Err(anyhow!("transient"))
                        } else {
                            Ok(42)
                        }
                    }
                },
                |msg| messages.push(msg.to_string()),
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff slept 5s then 10s (paused clock auto-advances).
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(
            messages,
            vec![
                "Transcription failed (attempt 1/3). Retrying in 5s...",
                "Transcription failed (attempt 2/3). Retrying in 10s...",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let started = tokio::time::Instant::now();
        let result: Result<(), anyhow::Error> = policy()
            .run(
                "Formatting",
                move || {
                    let calls = calls_op.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Err(anyhow!("failure {}", n))
                    }
                },
                |_| {},
            )
            .await;

        // Exactly max_attempts invocations, last error surfaced, and no
        // delay after the final attempt (5 + 10 only).
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().to_string(), "failure 3");
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_zero_max_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        };

        let mut calls = 0;
        let result: Result<(), anyhow::Error> = policy
            .run(
                "Op",
                || {
                    calls += 1;
                    async { Err(anyhow!("nope")) }
                },
                |_| {},
            )
            .await;

        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().to_string(), "nope");
    }

    #[tokio::test]
    async fn test_single_attempt_success_has_no_callbacks() {
        let mut callbacks = 0;
        let result: Result<&str, anyhow::Error> = policy()
            .run("Op", || async { Ok("done") }, |_| callbacks += 1)
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(callbacks, 0);
    }
}
