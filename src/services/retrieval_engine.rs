//! Ranking pipeline: embed, search, re-rank by priority, truncate.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::embedding_client::EmbeddingClient;
use super::vector_index::VectorIndex;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BatchFailure, BatchReport, Candidate, RankedMatch, RetrievalResult, SearchFilters, SearchHit,
    MIN_PRIORITY,
};

/// Number of matches returned by [`RetrievalEngine::rank`] callers that have
/// no preference.
pub const DEFAULT_LIMIT: usize = 3;

/// Options for [`RetrievalEngine::rank_with`].
#[derive(Debug, Clone)]
pub struct RankOptions {
    pub limit: usize,
    pub filters: SearchFilters,
    /// Shared by the embedding and search calls.
    pub deadline: Option<Instant>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            filters: SearchFilters::default(),
            deadline: None,
        }
    }
}

impl RankOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Boundary API consumed by the chat integration layer.
///
/// Never retries on its own; retry and circuit breaking live in the guards
/// owned by the embedding client and the vector index.
pub struct RetrievalEngine {
    embeddings: Arc<EmbeddingClient>,
    index: Arc<VectorIndex>,
}

impl RetrievalEngine {
    pub fn new(embeddings: Arc<EmbeddingClient>, index: Arc<VectorIndex>) -> Self {
        Self { embeddings, index }
    }

    pub fn embeddings(&self) -> &EmbeddingClient {
        &self.embeddings
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Rank candidates for `text`, best first, at most `limit` of them.
    pub async fn rank(&self, text: &str, limit: usize) -> DomainResult<RetrievalResult> {
        self.rank_with(text, RankOptions::with_limit(limit)).await
    }

    /// [`rank`](Self::rank) with filters and a deadline.
    ///
    /// A zero limit returns an empty result without contacting either
    /// dependency.
    #[instrument(skip(self, text, options), fields(limit = options.limit))]
    pub async fn rank_with(&self, text: &str, options: RankOptions) -> DomainResult<RetrievalResult> {
        if options.limit == 0 {
            return Ok(RetrievalResult::default());
        }

        let vector = self
            .embeddings
            .embed_with_deadline(text, options.deadline)
            .await?;

        let hits = self
            .index
            .search_filtered(&vector, options.limit, &options.filters, options.deadline)
            .await?;

        let result = rank_hits(hits, options.limit);
        debug!(matches = result.len(), codes = ?result.codes(), "Ranked candidates");
        Ok(result)
    }

    /// Rank several texts concurrently. Results keep the order of `texts`,
    /// and one failing text does not affect the others.
    pub async fn rank_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        limit: usize,
    ) -> Vec<DomainResult<RetrievalResult>> {
        join_all(texts.iter().map(|text| self.rank(text.as_ref(), limit))).await
    }

    /// Compute and store embeddings for `candidates`.
    ///
    /// With `skip_existing`, candidates that already carry an embedding of
    /// the configured dimension are left alone; vectors of any other length
    /// are recomputed. Failures are recorded per candidate and never abort the
    /// batch.
    pub async fn vectorize_batch(&self, candidates: &[Candidate], skip_existing: bool) -> BatchReport {
        let mut report = BatchReport::default();

        for candidate in candidates {
            if skip_existing && candidate.has_embedding_of(self.embeddings.dimension()) {
                report.skipped += 1;
                continue;
            }

            let outcome = match self.embeddings.embed(&candidate.description).await {
                Ok(vector) => self.index.upsert(candidate.id, &vector).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.updated += 1,
                Err(error) => {
                    warn!(
                        code = %candidate.code,
                        id = candidate.id,
                        kind = error.kind(),
                        error = %error,
                        "Failed to vectorize candidate"
                    );
                    report.failed.push(BatchFailure {
                        id: candidate.id,
                        code: candidate.code.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Batch vectorization complete"
        );
        report
    }
}

/// `1 - distance`, clamped to `[0, 1]`. NaN maps to 0.
pub fn similarity_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        0.0
    } else {
        (1.0 - distance).clamp(0.0, 1.0)
    }
}

fn compare_matches(a: &RankedMatch, b: &RankedMatch) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.candidate.priority.cmp(&a.candidate.priority))
        .then_with(|| a.candidate.code.cmp(&b.candidate.code))
}

/// Priority re-ranking of raw search hits.
///
/// `final_score = similarity * priority / max_priority_in_batch`. Sorted by
/// score descending, then priority descending, then code ascending, and
/// truncated to `limit`.
#[allow(clippy::cast_precision_loss)]
pub fn rank_hits(hits: Vec<SearchHit>, limit: usize) -> RetrievalResult {
    let max_priority = hits
        .iter()
        .map(|hit| hit.candidate.priority)
        .max()
        .unwrap_or(MIN_PRIORITY)
        .max(1);

    let mut matches: Vec<RankedMatch> = hits
        .into_iter()
        .map(|hit| {
            let similarity = similarity_from_distance(hit.distance);
            let weight = hit.candidate.priority as f32 / max_priority as f32;
            RankedMatch {
                similarity,
                final_score: similarity * weight,
                candidate: hit.candidate,
            }
        })
        .collect();

    matches.sort_by(compare_matches);
    matches.truncate(limit);
    RetrievalResult::new(matches)
}
