// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry with exponential backoff.
//!
//! Only remote transfers and subprocess invocations go through here. The
//! caller decides which errors are worth another attempt.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("failed after {attempts} attempt(s): {error}")]
    Failed { attempts: u32, error: E },
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Run `attempt_fn` until it succeeds, fails with an error `retryable`
    /// rejects, or the attempt budget is spent.
    ///
    /// Cancellation is observed before every attempt and during backoff
    /// sleeps. An attempt already in flight is not interrupted here; the
    /// adapters watch the same token.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        retryable: impl Fn(&E) -> bool,
        mut attempt_fn: F,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let error = match attempt_fn().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            operation,
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= max_attempts || !retryable(&error) {
                return Err(RetryError::Failed { attempts: attempt, error });
            }

            let delay = self.delay_for(attempt);
            warn!(
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
