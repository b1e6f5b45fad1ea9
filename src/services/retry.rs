//! Retry policy with exponential backoff for dependency calls.
//!
//! Delays double with each retry from `base_delay` up to `max_delay`, with a
//! randomization factor applied to each delay. Only errors accepted by the
//! policy's `retryable` predicate are retried (transient ones by default).

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use crate::domain::errors::{Dependency, DependencyError};
use crate::domain::models::GuardConfig;

type RetryPredicate = Arc<dyn Fn(&DependencyError) -> bool + Send + Sync>;

/// The error that ended a retried call, and how many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: DependencyError,
    pub attempts: u32,
}

/// Retry policy configuration for handling transient errors
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    max_attempts: u32,
    /// Delay before the first retry
    base_delay: Duration,
    /// Ceiling for any single delay
    max_delay: Duration,
    /// Randomization factor in `[0, 1]`
    jitter: f64,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Create a new retry policy with ±50% jitter that retries transient
    /// errors.
    ///
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: 0.5,
            retryable: Arc::new(DependencyError::is_transient),
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
            .with_jitter(config.jitter)
    }

    /// Set the randomization factor, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Replace the predicate deciding which errors are worth another attempt.
    #[must_use]
    pub fn with_retryable<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&DependencyError) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(self.jitter)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Execute an operation with exponential backoff retry logic.
    ///
    /// Each attempt is bounded by `deadline`; an attempt cut short by it
    /// fails with `DeadlineExceeded` and is not retried. No retry is
    /// scheduled if its delay would end past the deadline.
    pub async fn execute<F, Fut, T>(
        &self,
        dependency: Dependency,
        deadline: Option<Instant>,
        mut operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = match deadline {
                Some(deadline) => timeout_at(deadline, operation())
                    .await
                    .unwrap_or_else(|_| Err(DependencyError::DeadlineExceeded)),
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(%dependency, attempts, "Call succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let retryable =
                error != DependencyError::DeadlineExceeded && (self.retryable)(&error);
            if !retryable || attempts >= self.max_attempts {
                if retryable {
                    warn!(%dependency, attempts, error = %error, "Retries exhausted");
                } else {
                    debug!(%dependency, attempts, error = %error, "Not retrying");
                }
                return Err(RetryFailure { error, attempts });
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.max_delay)
                .min(self.max_delay);

            if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                debug!(%dependency, attempts, "Next retry would pass the deadline");
                return Err(RetryFailure { error, attempts });
            }

            warn!(
                %dependency,
                attempt = attempts,
                max_attempts = self.max_attempts,
                error = %error,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Transient failure, retrying"
            );
            sleep(delay).await;
        }
    }
}
