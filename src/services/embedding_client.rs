//! Cached, guarded access to the embedding provider.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::embedding_cache::EmbeddingCache;
use super::resilience_guard::ResilienceGuard;
use crate::domain::errors::{Dependency, DependencyError, DomainResult, RetrievalError};
use crate::domain::models::embedding::collapse_whitespace;
use crate::domain::models::EmbeddingVector;
use crate::domain::ports::EmbeddingProvider;

const HEALTH_CHECK_TEXT: &str = "health check";

/// Turns text into embeddings.
///
/// Lookups go to the cache first; misses go to the provider through the
/// embedding guard and the result is cached.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    guard: Arc<ResilienceGuard>,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        guard: Arc<ResilienceGuard>,
        dimension: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            guard,
            dimension,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn guard(&self) -> &ResilienceGuard {
        &self.guard
    }

    /// Embed `text` with no deadline.
    pub async fn embed(&self, text: &str) -> DomainResult<EmbeddingVector> {
        self.embed_with_deadline(text, None).await
    }

    /// Embed `text`, giving up on the provider at `deadline`.
    ///
    /// # Errors
    /// - `Permanent` with `InvalidInput` for empty or whitespace-only text;
    ///   the provider is not contacted.
    /// - Whatever the embedding guard surfaces (`CircuitOpen`, `Transient`,
    ///   `Permanent`).
    /// - `DimensionMismatch` if the provider returns the wrong length.
    pub async fn embed_with_deadline(
        &self,
        text: &str,
        deadline: Option<Instant>,
    ) -> DomainResult<EmbeddingVector> {
        let prepared = collapse_whitespace(text);
        if prepared.is_empty() {
            return Err(RetrievalError::Permanent {
                dependency: Dependency::EmbeddingProvider,
                source: DependencyError::InvalidInput("text is empty".to_string()),
            });
        }

        if let Some(vector) = self.cache.get(&prepared) {
            return Ok(vector);
        }

        let provider = &self.provider;
        let input = prepared.as_str();
        let values = self.guard.call(deadline, || provider.embed(input)).await?;

        let vector = EmbeddingVector::new(values, self.dimension).inspect_err(|e| {
            error!(provider = provider.name(), error = %e, "Provider returned wrong dimension");
        })?;

        debug!(provider = provider.name(), "Embedding cached");
        self.cache.put(&prepared, vector.clone());
        Ok(vector)
    }

    /// Embed a fixed check string, bypassing the cache.
    pub async fn health_check(&self) -> bool {
        let provider = &self.provider;
        match self.guard.call(None, || provider.embed(HEALTH_CHECK_TEXT)).await {
            Ok(values) if values.len() == self.dimension => true,
            Ok(values) => {
                warn!(
                    expected = self.dimension,
                    actual = values.len(),
                    "Health check returned wrong dimension"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Embedding provider health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedEmbeddingProvider;
    use crate::services::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    fn client(provider: Arc<ScriptedEmbeddingProvider>) -> EmbeddingClient {
        let guard = ResilienceGuard::new(
            Dependency::EmbeddingProvider,
            CircuitBreakerConfig {
                failure_threshold: 5,
                cooldown: Duration::from_secs(30),
            },
            RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(10)),
        );
        EmbeddingClient::new(
            provider,
            Arc::new(EmbeddingCache::new(100, Duration::from_secs(60))),
            Arc::new(guard),
            3,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_embed_is_served_from_cache() {
        let provider = Arc::new(
            ScriptedEmbeddingProvider::new(3).with_vector("hello there", vec![0.1, 0.2, 0.3]),
        );
        let client = client(provider.clone());

        let first = client.embed("hello there").await.unwrap();
        let second = client.embed("  hello   there ").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_slice(), &[0.1, 0.2, 0.3]);
        assert_eq!(provider.calls(), 1);
        assert_eq!(client.cache().stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_rejected_without_provider_call() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(3));
        let client = client(provider.clone());

        for text in ["", "   ", "\n\t"] {
            let err = client.embed(text).await.unwrap_err();
            assert!(matches!(
                err,
                RetrievalError::Permanent {
                    source: DependencyError::InvalidInput(_),
                    ..
                }
            ));
        }
        assert_eq!(provider.calls(), 0);
        assert_eq!(client.guard().snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_dimension_is_not_cached() {
        let provider =
            Arc::new(ScriptedEmbeddingProvider::new(3).with_vector("short", vec![1.0, 0.0]));
        let client = client(provider.clone());

        let err = client.embed("short").await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(client.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_failures_open_circuit_and_sixth_fails_fast() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(3));
        provider.fail_always(Some(DependencyError::Unavailable("503".to_string())));
        let client = client(provider.clone());

        for i in 0..5 {
            let err = client.embed(&format!("message {i}")).await.unwrap_err();
            assert!(matches!(err, RetrievalError::Transient { .. }));
        }
        assert_eq!(client.guard().breaker().state(), CircuitState::Open);

        let err = client.embed("message 6").await.unwrap_err();
        assert!(err.is_degraded());
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_while_circuit_open() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(3));
        let client = client(provider.clone());
        client.embed("cached").await.unwrap();

        provider.fail_always(Some(DependencyError::Timeout));
        for i in 0..5 {
            let _ = client.embed(&format!("miss {i}")).await;
        }
        assert_eq!(client.guard().breaker().state(), CircuitState::Open);

        assert!(client.embed("cached").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check() {
        let provider = Arc::new(ScriptedEmbeddingProvider::new(3));
        let client = client(provider.clone());
        assert!(client.health_check().await);
        assert!(client.cache().is_empty());

        provider.fail_next(DependencyError::Authentication);
        assert!(!client.health_check().await);
    }
}
