//! In-memory vector store for tests and local experiments.
//!
//! Brute-force cosine search over every stored embedding. Supports fault
//! injection so callers can exercise the resilience layer without a real
//! outage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::domain::errors::DependencyError;
use crate::domain::models::{cosine_distance, Candidate, SearchFilters, SearchHit};
use crate::domain::ports::VectorStore;

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    candidates: RwLock<Vec<Candidate>>,
    next_id: AtomicUsize,
    failure: Mutex<Option<DependencyError>>,
    queries: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error`, or clear with `None`.
    pub fn set_failure(&self, error: Option<DependencyError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of `query` calls that reached the store.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), DependencyError> {
        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn allocate_id(&self) -> i64 {
        let next = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        i64::try_from(next).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, DependencyError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let candidates = self.candidates.read().unwrap_or_else(PoisonError::into_inner);
        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .filter(|c| filters.matches(c))
            .filter_map(|c| {
                let stored = c.embedding.as_deref().filter(|e| !e.is_empty())?;
                if stored.len() != embedding.len() {
                    warn!(
                        code = %c.code,
                        stored = stored.len(),
                        expected = embedding.len(),
                        "Skipping candidate with stale embedding dimension"
                    );
                    return None;
                }
                let mut candidate = c.clone();
                candidate.embedding = None;
                Some(SearchHit {
                    candidate,
                    distance: cosine_distance(embedding, stored),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn upsert_embedding(&self, id: i64, embedding: &[f32]) -> Result<(), DependencyError> {
        self.check_failure()?;

        let mut candidates = self.candidates.write().unwrap_or_else(PoisonError::into_inner);
        let candidate = candidates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DependencyError::Rejected(format!("no candidate with id {id}")))?;

        candidate.embedding = Some(embedding.to_vec());
        candidate.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_candidates(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, DependencyError> {
        self.check_failure()?;

        let mut stored = self.candidates.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let mut inserted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let mut candidate = candidate.clone();
            if let Some(existing) = stored.iter_mut().find(|c| c.code == candidate.code) {
                candidate.id = existing.id;
                candidate.created_at = existing.created_at;
                candidate.updated_at = Some(now);
                if candidate.embedding.is_none() {
                    candidate.embedding = existing.embedding.take();
                }
                *existing = candidate.clone();
            } else {
                candidate.id = self.allocate_id();
                candidate.created_at = Some(now);
                candidate.updated_at = Some(now);
                stored.push(candidate.clone());
            }
            inserted.push(candidate);
        }

        Ok(inserted)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, DependencyError> {
        self.check_failure()?;
        let mut candidates = self
            .candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        candidates.sort_by_key(|c| c.id);
        Ok(candidates)
    }

    async fn count(&self) -> Result<usize, DependencyError> {
        self.check_failure()?;
        Ok(self
            .candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}
