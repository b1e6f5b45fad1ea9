use async_trait::async_trait;

use crate::domain::errors::DependencyError;
use crate::domain::models::{Candidate, SearchFilters, SearchHit};

/// Storage for candidates and their embeddings, with nearest-neighbour
/// queries.
///
/// Like [`EmbeddingProvider`](super::EmbeddingProvider), one call is one
/// attempt; the services own retry and breaker policy.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store name for logs and status output.
    fn name(&self) -> &'static str;

    /// Return up to `k` candidates closest to `embedding` by cosine distance,
    /// ascending, restricted to rows matching `filters`.
    ///
    /// Candidates without a stored embedding are never returned. Hits carry
    /// `embedding: None` to keep result sets small.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, DependencyError>;

    /// Store a computed embedding for an existing candidate.
    ///
    /// # Errors
    /// `Rejected` if no candidate has this id.
    async fn upsert_embedding(&self, id: i64, embedding: &[f32]) -> Result<(), DependencyError>;

    /// Insert or update candidates keyed by `code`, returning them with
    /// their assigned ids.
    async fn insert_candidates(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, DependencyError>;

    /// All candidates, including their embeddings, ordered by id.
    async fn list_candidates(&self) -> Result<Vec<Candidate>, DependencyError>;

    /// Number of stored candidates.
    async fn count(&self) -> Result<usize, DependencyError>;
}
