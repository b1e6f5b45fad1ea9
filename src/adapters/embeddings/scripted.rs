//! Deterministic embedding provider for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::DependencyError;
use crate::domain::ports::EmbeddingProvider;

/// Provider returning canned vectors, with scriptable failures.
///
/// Unknown texts embed to the first unit vector `[1, 0, ...]`. Failures can
/// be queued for the next calls, set for every call, or pinned to specific
/// texts. An optional delay simulates a slow upstream.
pub struct ScriptedEmbeddingProvider {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    failing_texts: HashMap<String, DependencyError>,
    scripted: Mutex<VecDeque<DependencyError>>,
    always: Mutex<Option<DependencyError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            failing_texts: HashMap::new(),
            scripted: Mutex::new(VecDeque::new()),
            always: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Fail every embed of exactly `text` with `error`.
    #[must_use]
    pub fn with_failing_text(mut self, text: &str, error: DependencyError) -> Self {
        self.failing_texts.insert(text.to_string(), error);
        self
    }

    /// Sleep for `delay` (tokio time) before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: DependencyError) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Fail every call with `error` until cleared with `None`.
    pub fn fail_always(&self, error: Option<DependencyError>) {
        *self.always.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of `embed` calls that reached the provider.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unit_vector(&self) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        if let Some(first) = vector.first_mut() {
            *first = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbeddingProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DependencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = queued {
            return Err(error);
        }

        let always = self
            .always
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = always {
            return Err(error);
        }

        if let Some(error) = self.failing_texts.get(text) {
            return Err(error.clone());
        }

        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.unit_vector()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_and_fallback_vectors() {
        let provider = ScriptedEmbeddingProvider::new(3).with_vector("hi", vec![0.0, 1.0, 0.0]);

        assert_eq!(provider.embed("hi").await.unwrap(), vec![0.0, 1.0, 0.0]);
        assert_eq!(provider.embed("other").await.unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_scripting_order() {
        let provider = ScriptedEmbeddingProvider::new(2)
            .with_failing_text("bad", DependencyError::InvalidInput("bad".to_string()));

        provider.fail_next(DependencyError::RateLimited);
        assert_eq!(provider.embed("x").await, Err(DependencyError::RateLimited));
        assert!(provider.embed("x").await.is_ok());
        assert!(matches!(
            provider.embed("bad").await,
            Err(DependencyError::InvalidInput(_))
        ));

        provider.fail_always(Some(DependencyError::Timeout));
        assert_eq!(provider.embed("x").await, Err(DependencyError::Timeout));
        provider.fail_always(None);
        assert!(provider.embed("x").await.is_ok());
    }
}
