//! Circuit breaker + retry wrapper around one external dependency.

use std::future::Future;

use tokio::time::Instant;
use tracing::debug;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use super::retry::{RetryFailure, RetryPolicy};
use crate::domain::errors::{Dependency, DependencyError, RetrievalError};
use crate::domain::models::GuardConfig;

/// Shields callers from a failing dependency.
///
/// Every call first asks the breaker for admission; admitted calls run under
/// the retry policy, and the whole call (all attempts) is reported to the
/// breaker as exactly one success or one failure.
#[derive(Debug)]
pub struct ResilienceGuard {
    dependency: Dependency,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilienceGuard {
    pub fn new(dependency: Dependency, breaker: CircuitBreakerConfig, retry: RetryPolicy) -> Self {
        Self {
            dependency,
            breaker: CircuitBreaker::new(dependency, breaker),
            retry,
        }
    }

    pub fn from_config(dependency: Dependency, config: &GuardConfig) -> Self {
        Self::new(
            dependency,
            CircuitBreakerConfig {
                failure_threshold: config.failure_threshold,
                cooldown: config.cooldown(),
            },
            RetryPolicy::from_config(config),
        )
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Run `operation` under the breaker and retry policy.
    ///
    /// # Errors
    /// - `CircuitOpen` if the breaker refuses admission; `operation` is not
    ///   invoked.
    /// - `Transient` when retryable failures persist through every attempt
    ///   (or the deadline passes).
    /// - `Permanent` on the first non-retryable failure.
    pub async fn call<F, Fut, T>(
        &self,
        deadline: Option<Instant>,
        operation: F,
    ) -> Result<T, RetrievalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DependencyError>>,
    {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(retry_after) => {
                debug!(dependency = %self.dependency, ?retry_after, "Circuit open, call rejected");
                return Err(RetrievalError::CircuitOpen {
                    dependency: self.dependency,
                    retry_after,
                });
            }
        };

        match self.retry.execute(self.dependency, deadline, operation).await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(RetryFailure { error, attempts }) => {
                permit.fail();
                if error.is_transient() {
                    Err(RetrievalError::Transient {
                        dependency: self.dependency,
                        attempts,
                        source: error,
                    })
                } else {
                    Err(RetrievalError::Permanent {
                        dependency: self.dependency,
                        source: error,
                    })
                }
            }
        }
    }
}
