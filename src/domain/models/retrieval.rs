//! Search and ranking results.

use serde::Serialize;

use super::candidate::{Candidate, EmotionTone};
use crate::domain::errors::RetrievalError;

/// Optional metadata filters applied by the vector store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub emotion_tone: Option<EmotionTone>,
    pub category: Option<String>,
    pub usage_scene: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.emotion_tone.is_none() && self.category.is_none() && self.usage_scene.is_none()
    }

    /// Whether a candidate satisfies every set filter.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.emotion_tone
            .is_none_or(|tone| candidate.emotion_tone == Some(tone))
            && self
                .category
                .as_deref()
                .is_none_or(|c| candidate.category.as_deref() == Some(c))
            && self
                .usage_scene
                .as_deref()
                .is_none_or(|s| candidate.usage_scene.as_deref() == Some(s))
    }
}

/// A nearest-neighbour hit returned by the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub candidate: Candidate,
    /// Cosine distance to the query, lower is closer.
    pub distance: f32,
}

/// A candidate after priority re-ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub candidate: Candidate,
    /// `1 - distance`, clamped to `[0, 1]`.
    pub similarity: f32,
    /// `similarity * priority / max_priority_in_batch`.
    pub final_score: f32,
}

/// Ordered ranking output, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    matches: Vec<RankedMatch>,
}

impl RetrievalResult {
    pub fn new(matches: Vec<RankedMatch>) -> Self {
        Self { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedMatch> {
        self.matches.iter()
    }

    pub fn matches(&self) -> &[RankedMatch] {
        &self.matches
    }

    /// Candidate codes in rank order, e.g. for adding reactions.
    pub fn codes(&self) -> Vec<&str> {
        self.matches
            .iter()
            .map(|m| m.candidate.code.as_str())
            .collect()
    }

    pub fn into_inner(self) -> Vec<RankedMatch> {
        self.matches
    }
}

impl IntoIterator for RetrievalResult {
    type Item = RankedMatch;
    type IntoIter = std::vec::IntoIter<RankedMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

/// A candidate that could not be vectorized.
#[derive(Debug)]
pub struct BatchFailure {
    pub id: i64,
    pub code: String,
    pub error: RetrievalError,
}

/// Outcome of a batch (re)vectorization run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.updated + self.skipped + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_match() {
        let candidate = Candidate::new(":tada:", "celebration")
            .with_emotion_tone(EmotionTone::Positive)
            .with_category("celebration");

        assert!(SearchFilters::default().matches(&candidate));
        assert!(SearchFilters::default().is_empty());

        let filters = SearchFilters {
            emotion_tone: Some(EmotionTone::Positive),
            category: Some("celebration".to_string()),
            usage_scene: None,
        };
        assert!(filters.matches(&candidate));

        let filters = SearchFilters {
            usage_scene: Some("meetings".to_string()),
            ..Default::default()
        };
        assert!(!filters.matches(&candidate));
    }

    #[test]
    fn test_batch_report_totals() {
        let report = BatchReport {
            updated: 3,
            skipped: 2,
            failed: vec![BatchFailure {
                id: 7,
                code: ":x:".to_string(),
                error: RetrievalError::DimensionMismatch {
                    expected: 2,
                    actual: 1,
                },
            }],
        };
        assert_eq!(report.total(), 6);
        assert!(!report.is_clean());
    }
}
