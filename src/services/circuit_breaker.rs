//! Circuit breaker pattern for failure detection and recovery.
//!
//! Tracks consecutive failed calls to one dependency and stops sending it
//! traffic once a threshold is reached, preventing cascade failures. After a
//! cooldown a single trial call decides whether the circuit closes again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::errors::Dependency;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Duration to keep the circuit open before allowing a trial call.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are blocked.
    Open,
    /// Circuit is testing if the dependency has recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    open_count: u32,
    rejections: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            open_count: 0,
            rejections: 0,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
        self.open_count += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }

    fn half_open(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.trial_in_flight = true;
    }
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub dependency: Dependency,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Times the circuit has opened since creation.
    pub open_count: u32,
    /// Calls rejected without reaching the dependency.
    pub total_rejections: u64,
    /// Milliseconds until a trial call is admitted, while open.
    pub retry_after_ms: Option<u64>,
}

/// Circuit breaker guarding a single dependency.
///
/// State lives behind a `std::sync::Mutex`; the lock is only held for the
/// bookkeeping around a call, never across the call itself.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: Dependency,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new, closed circuit breaker.
    pub fn new(dependency: Dependency, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency,
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to send one call to the dependency.
    ///
    /// Returns a permit the caller must settle with [`CircuitPermit::succeed`]
    /// or [`CircuitPermit::fail`], or the time remaining until a trial call
    /// will be admitted.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, Duration> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(CircuitPermit::new(self, false)),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(self.config.cooldown, |opened_at| now - opened_at);

                if elapsed >= self.config.cooldown {
                    inner.half_open();
                    info!(
                        dependency = %self.dependency,
                        "Circuit half-open, admitting trial call"
                    );
                    Ok(CircuitPermit::new(self, true))
                } else {
                    inner.rejections += 1;
                    Err(self.config.cooldown - elapsed)
                }
            }
            CircuitState::HalfOpen if inner.trial_in_flight => {
                inner.rejections += 1;
                Err(Duration::ZERO)
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                Ok(CircuitPermit::new(self, true))
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();

        if trial {
            inner.close();
            info!(dependency = %self.dependency, "Circuit closed after successful trial");
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
        // A call admitted before the circuit opened says nothing about the
        // trial, so late results in Open/HalfOpen are ignored.
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        if trial {
            inner.open(now);
            warn!(
                dependency = %self.dependency,
                cooldown_secs = self.config.cooldown.as_secs_f64(),
                "Trial call failed, circuit re-opened"
            );
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures += 1;
            if inner.consecutive_failures >= self.config.failure_threshold {
                inner.open(now);
                warn!(
                    dependency = %self.dependency,
                    consecutive_failures = inner.consecutive_failures,
                    cooldown_secs = self.config.cooldown.as_secs_f64(),
                    "Circuit opened"
                );
            }
        }
    }

    /// Current state, without triggering the Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        let retry_after_ms = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let remaining = self.config.cooldown.saturating_sub(opened_at.elapsed());
                Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };

        CircuitSnapshot {
            dependency: self.dependency,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            open_count: inner.open_count,
            total_rejections: inner.rejections,
            retry_after_ms,
        }
    }

    /// Manually reset the circuit.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.close();
        inner.open_count = 0;
    }
}

/// Admission to make one call through a [`CircuitBreaker`].
///
/// Dropping an unsettled trial permit (for example when the caller's future
/// is cancelled) counts as a failed trial so the breaker never stays stuck
/// half-open. Unsettled non-trial permits are ignored.
#[derive(Debug)]
#[must_use = "settle the permit with succeed() or fail()"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> CircuitPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this is the single half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.on_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            Dependency::EmbeddingProvider,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(cooldown_secs),
            },
        )
    }

    fn fail_once(breaker: &CircuitBreaker) {
        breaker.try_acquire().unwrap().fail();
    }

    #[test]
    fn test_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let breaker = breaker(3, 30);
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail_once(&breaker);
        fail_once(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 2);

        fail_once(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.snapshot().open_count, 1);

        let retry_after = breaker.try_acquire().unwrap_err();
        assert_eq!(retry_after, Duration::from_secs(30));
        assert_eq!(breaker.snapshot().total_rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let breaker = breaker(3, 30);

        fail_once(&breaker);
        fail_once(&breaker);
        breaker.try_acquire().unwrap().succeed();
        fail_once(&breaker);
        fail_once(&breaker);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cooldown() {
        let breaker = breaker(1, 10);
        fail_once(&breaker);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(breaker.try_acquire().unwrap_err(), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(6)).await;
        let trial = breaker.try_acquire().unwrap();
        assert!(trial.is_trial());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Only one trial at a time.
        assert!(breaker.try_acquire().is_err());

        trial.succeed();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_timestamp() {
        let breaker = breaker(1, 10);
        fail_once(&breaker);

        tokio::time::advance(Duration::from_secs(10)).await;
        breaker.try_acquire().unwrap().fail();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.snapshot().open_count, 2);

        // The cooldown restarts from the failed trial.
        assert_eq!(breaker.try_acquire().unwrap_err(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_counts_as_failure() {
        let breaker = breaker(1, 10);
        fail_once(&breaker);
        tokio::time::advance(Duration::from_secs(10)).await;

        drop(breaker.try_acquire().unwrap());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_results_do_not_close_open_circuit() {
        let breaker = breaker(2, 10);
        let straggler = breaker.try_acquire().unwrap();

        fail_once(&breaker);
        fail_once(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);

        straggler.succeed();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_and_reset() {
        let breaker = breaker(1, 30);
        fail_once(&breaker);
        tokio::time::advance(Duration::from_secs(12)).await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.retry_after_ms, Some(18_000));
        assert_eq!(snapshot.dependency, Dependency::EmbeddingProvider);

        breaker.reset();
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.open_count, 0);
        assert_eq!(snapshot.retry_after_ms, None);
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
        assert_eq!(CircuitState::Closed.to_string(), "closed");
    }
}
