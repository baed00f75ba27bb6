//! Bounded retry of read-modify-write cycles that hit optimistic-concurrency
//! conflicts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{ReconcileError, Result};

/// Exponential backoff schedule with multiplicative jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Total number of attempts, including the first one.
    pub steps: u32,
    pub initial_delay: Duration,
    pub factor: f64,
    /// Each delay is stretched by a random fraction in `0..jitter`.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Self {
            steps: config.steps.max(1),
            initial_delay: config.initial_delay(),
            factor: config.factor,
            jitter: config.jitter,
        }
    }
}

impl Backoff {
    /// Un-jittered delay before attempt `attempt + 1` (zero-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.factor.powi(exponent);
        Duration::from_nanos(nanos.min(u64::MAX as f64) as u64)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let stretch = rand::thread_rng().gen_range(0.0..self.jitter);
        base + Duration::from_nanos((base.as_nanos() as f64 * stretch) as u64)
    }
}

/// Runs a refetch-mutate-write closure until it stops reporting conflicts.
///
/// The closure must re-read its target on every call. Errors other than a
/// conflict are returned immediately. Cancelling the token aborts the loop at
/// the next attempt boundary or during a backoff sleep.
#[derive(Debug, Clone)]
pub struct ConflictRetry {
    backoff: Backoff,
    cancel: CancellationToken,
}

impl ConflictRetry {
    pub fn new(backoff: Backoff, cancel: CancellationToken) -> Self {
        Self { backoff, cancel }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled);
            }

            let err = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_conflict() => err,
                Err(err) => return Err(err),
            };

            attempt += 1;
            if attempt >= self.backoff.steps {
                return Err(ReconcileError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff.delay(attempt - 1);
            warn!(
                operation,
                attempt,
                max_attempts = self.backoff.steps,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "write conflict, retrying"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ReconcileError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
