//! Guarded nearest-neighbour search over the vector store.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use super::resilience_guard::ResilienceGuard;
use crate::domain::errors::{DomainResult, RetrievalError};
use crate::domain::models::{EmbeddingVector, SearchFilters, SearchHit};
use crate::domain::ports::VectorStore;

/// Default multiplier applied to the requested result count.
pub const DEFAULT_OVERSAMPLE_FACTOR: usize = 2;

/// Queries the vector store through its own resilience guard.
///
/// Asks the store for `k * oversample_factor` neighbours so priority
/// re-ranking has headroom to promote candidates that are slightly further
/// away.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    guard: Arc<ResilienceGuard>,
    dimension: usize,
    oversample_factor: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, guard: Arc<ResilienceGuard>, dimension: usize) -> Self {
        Self {
            store,
            guard,
            dimension,
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
        }
    }

    /// Set the oversample factor (at least 1).
    #[must_use]
    pub fn with_oversample_factor(mut self, factor: usize) -> Self {
        self.oversample_factor = factor.max(1);
        self
    }

    pub fn oversample_factor(&self) -> usize {
        self.oversample_factor
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn guard(&self) -> &ResilienceGuard {
        &self.guard
    }

    fn check_dimension(&self, actual: usize) -> DomainResult<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }

    /// Up to `k * oversample_factor` hits in ascending distance.
    pub async fn search(&self, vector: &EmbeddingVector, k: usize) -> DomainResult<Vec<SearchHit>> {
        self.search_filtered(vector, k, &SearchFilters::default(), None)
            .await
    }

    /// [`search`](Self::search) restricted by metadata filters and bounded by
    /// an optional deadline.
    pub async fn search_filtered(
        &self,
        vector: &EmbeddingVector,
        k: usize,
        filters: &SearchFilters,
        deadline: Option<Instant>,
    ) -> DomainResult<Vec<SearchHit>> {
        self.check_dimension(vector.dimension())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let fetch = k.saturating_mul(self.oversample_factor);
        let store = &self.store;
        let query = vector.as_slice();

        let mut hits = self
            .guard
            .call(deadline, || store.query(query, fetch, filters))
            .await?;

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(fetch);

        debug!(
            store = store.name(),
            requested = k,
            fetched = fetch,
            returned = hits.len(),
            "Vector search complete"
        );
        Ok(hits)
    }

    /// Write an embedding back for candidate `id`.
    pub async fn upsert(&self, id: i64, vector: &EmbeddingVector) -> DomainResult<()> {
        self.upsert_with_deadline(id, vector, None).await
    }

    pub async fn upsert_with_deadline(
        &self,
        id: i64,
        vector: &EmbeddingVector,
        deadline: Option<Instant>,
    ) -> DomainResult<()> {
        self.check_dimension(vector.dimension())?;
        let store = &self.store;
        let values = vector.as_slice();
        self.guard
            .call(deadline, || store.upsert_embedding(id, values))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryVectorStore;
    use crate::domain::errors::Dependency;
    use crate::domain::models::{Candidate, EmotionTone, GuardConfig};

    fn guard() -> Arc<ResilienceGuard> {
        Arc::new(ResilienceGuard::from_config(
            Dependency::VectorStore,
            &GuardConfig::default(),
        ))
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let candidates: Vec<Candidate> = (0..10u8)
            .map(|i| {
                let angle = f32::from(i) * 0.1;
                Candidate::new(format!(":e{i}:"), format!("entry {i}"))
                    .with_emotion_tone(if i % 2 == 0 {
                        EmotionTone::Positive
                    } else {
                        EmotionTone::Negative
                    })
                    .with_embedding(vec![angle.cos(), angle.sin()])
            })
            .collect();
        store.insert_candidates(&candidates).await.unwrap();
        store
    }

    fn query() -> EmbeddingVector {
        EmbeddingVector::new(vec![1.0, 0.0], 2).unwrap()
    }

    #[tokio::test]
    async fn test_oversampled_and_sorted() {
        let index = VectorIndex::new(seeded_store().await, guard(), 2);

        let hits = index.search(&query(), 3).await.unwrap();
        assert_eq!(hits.len(), 6);
        assert_eq!(hits[0].candidate.code, ":e0:");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_custom_oversample_factor() {
        let index = VectorIndex::new(seeded_store().await, guard(), 2).with_oversample_factor(3);
        assert_eq!(index.search(&query(), 2).await.unwrap().len(), 6);

        let index = VectorIndex::new(seeded_store().await, guard(), 2).with_oversample_factor(0);
        assert_eq!(index.oversample_factor(), 1);
    }

    #[tokio::test]
    async fn test_filters_forwarded() {
        let index = VectorIndex::new(seeded_store().await, guard(), 2);
        let filters = SearchFilters {
            emotion_tone: Some(EmotionTone::Negative),
            ..Default::default()
        };

        let hits = index
            .search_filtered(&query(), 2, &filters, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits
            .iter()
            .all(|h| h.candidate.emotion_tone == Some(EmotionTone::Negative)));
    }

    #[tokio::test]
    async fn test_dimension_checked_before_store() {
        let store = seeded_store().await;
        let index = VectorIndex::new(store.clone(), guard(), 3);

        let err = index.search(&query(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_k_returns_empty() {
        let store = seeded_store().await;
        let index = VectorIndex::new(store.clone(), guard(), 2);
        assert!(index.search(&query(), 0).await.unwrap().is_empty());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_then_search() {
        let store = Arc::new(InMemoryVectorStore::new());
        let inserted = store
            .insert_candidates(&[Candidate::new(":new:", "fresh")])
            .await
            .unwrap();
        let index = VectorIndex::new(store.clone(), guard(), 2);

        assert!(index.search(&query(), 1).await.unwrap().is_empty());
        index.upsert(inserted[0].id, &query()).await.unwrap();

        let hits = index.search(&query(), 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].candidate.embedding.is_none());
    }

    #[tokio::test]
    async fn test_upsert_unknown_id_is_permanent() {
        let index = VectorIndex::new(Arc::new(InMemoryVectorStore::new()), guard(), 2);
        let err = index.upsert(99, &query()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Permanent { .. }));
    }
}
