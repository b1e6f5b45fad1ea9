//! Candidate model: a taggable emoji entry held by the vector store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest priority a candidate may carry.
pub const MIN_PRIORITY: u32 = 1;

/// Highest priority a candidate may carry.
pub const MAX_PRIORITY: u32 = 10;

/// Longest accepted candidate code, including the surrounding colons.
pub const MAX_CODE_LENGTH: usize = 100;

/// Validation failures for candidate records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("code is required")]
    MissingCode,

    #[error("Invalid emoji code format: {0} (must be like ':emoji_name:')")]
    InvalidCodeFormat(String),

    #[error("code too long: {0} > {MAX_CODE_LENGTH}")]
    CodeTooLong(usize),

    #[error("description is required")]
    MissingDescription,

    #[error("Invalid priority: {0} (must be between {MIN_PRIORITY} and {MAX_PRIORITY})")]
    InvalidPriority(u32),

    #[error("Invalid emotion tone: {0} (must be one of positive, negative, neutral)")]
    InvalidEmotionTone(String),

    #[error("Invalid embedding dimension: {actual} (must be {expected})")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },
}

/// Emotional tone attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTone {
    Positive,
    Negative,
    Neutral,
}

impl EmotionTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for EmotionTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionTone {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            other => Err(CandidateError::InvalidEmotionTone(other.to_string())),
        }
    }
}

/// A curated emoji entry with semantic metadata and its stored embedding.
///
/// The vector store owns these records. The retrieval core only reads them,
/// except during batch vectorization which writes embeddings back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Store-assigned identifier (0 until persisted).
    #[serde(default)]
    pub id: i64,
    /// Emoji code, e.g. `:smile:`.
    pub code: String,
    /// Semantic description; this is the text that gets embedded.
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub emotion_tone: Option<EmotionTone>,
    #[serde(default)]
    pub usage_scene: Option<String>,
    /// Ranking weight in `MIN_PRIORITY..=MAX_PRIORITY`.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_priority() -> u32 {
    MIN_PRIORITY
}

impl Candidate {
    /// Create an unpersisted candidate with default priority.
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            code: code.into(),
            description: description.into(),
            category: None,
            emotion_tone: None,
            usage_scene: None,
            priority: MIN_PRIORITY,
            embedding: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_emotion_tone(mut self, tone: EmotionTone) -> Self {
        self.emotion_tone = Some(tone);
        self
    }

    pub fn with_usage_scene(mut self, scene: impl Into<String>) -> Self {
        self.usage_scene = Some(scene.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// True if the record already carries a non-empty embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// True if the stored embedding has exactly `dimension` components.
    pub fn has_embedding_of(&self, dimension: usize) -> bool {
        self.embedding
            .as_ref()
            .is_some_and(|e| !e.is_empty() && e.len() == dimension)
    }

    /// Validate the record against the model rules and the deployment's
    /// embedding dimension.
    pub fn validate(&self, dimension: usize) -> Result<(), CandidateError> {
        validate_code(&self.code)?;

        if self.description.trim().is_empty() {
            return Err(CandidateError::MissingDescription);
        }

        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(CandidateError::InvalidPriority(self.priority));
        }

        if let Some(embedding) = &self.embedding {
            if embedding.len() != dimension {
                return Err(CandidateError::InvalidEmbeddingDimension {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(())
    }

    /// Trim the description in place, as the store expects.
    pub fn normalized(mut self) -> Self {
        self.description = self.description.trim().to_string();
        self
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.description)
    }
}

fn validate_code(code: &str) -> Result<(), CandidateError> {
    if code.is_empty() {
        return Err(CandidateError::MissingCode);
    }

    let inner = code
        .strip_prefix(':')
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or_else(|| CandidateError::InvalidCodeFormat(code.to_string()))?;

    if inner.is_empty() || inner.contains(':') {
        return Err(CandidateError::InvalidCodeFormat(code.to_string()));
    }

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(CandidateError::CodeTooLong(code.chars().count()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_candidate() {
        let candidate = Candidate::new(":smile:", "  happy face  ")
            .with_priority(5)
            .with_emotion_tone(EmotionTone::Positive)
            .normalized();

        assert_eq!(candidate.description, "happy face");
        assert!(candidate.validate(3).is_ok());
        assert!(!candidate.has_embedding());
    }

    #[test]
    fn test_has_embedding_of_checks_length() {
        let candidate = Candidate::new(":a:", "alpha").with_embedding(vec![1.0, 0.0]);
        assert!(candidate.has_embedding());
        assert!(candidate.has_embedding_of(2));
        assert!(!candidate.has_embedding_of(3));

        let empty = Candidate::new(":b:", "beta").with_embedding(Vec::new());
        assert!(!empty.has_embedding_of(0));
    }

    #[test]
    fn test_code_format() {
        for bad in ["smile", ":smile", "smile:", "::", ":a:b:"] {
            let candidate = Candidate::new(bad, "desc");
            assert!(
                matches!(candidate.validate(3), Err(CandidateError::InvalidCodeFormat(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(
            Candidate::new("", "desc").validate(3),
            Err(CandidateError::MissingCode)
        );

        let long = format!(":{}:", "a".repeat(MAX_CODE_LENGTH));
        assert!(matches!(
            Candidate::new(long, "desc").validate(3),
            Err(CandidateError::CodeTooLong(_))
        ));
    }

    #[test]
    fn test_priority_bounds() {
        assert_eq!(
            Candidate::new(":a:", "d").with_priority(0).validate(3),
            Err(CandidateError::InvalidPriority(0))
        );
        assert_eq!(
            Candidate::new(":a:", "d").with_priority(11).validate(3),
            Err(CandidateError::InvalidPriority(11))
        );
        assert!(Candidate::new(":a:", "d").with_priority(10).validate(3).is_ok());
    }

    #[test]
    fn test_embedding_dimension_checked() {
        let candidate = Candidate::new(":a:", "d").with_embedding(vec![0.1, 0.2]);
        assert_eq!(
            candidate.validate(3),
            Err(CandidateError::InvalidEmbeddingDimension {
                expected: 3,
                actual: 2
            })
        );
        assert!(candidate.has_embedding());
    }

    #[test]
    fn test_emotion_tone_parse() {
        assert_eq!("Positive".parse::<EmotionTone>(), Ok(EmotionTone::Positive));
        assert_eq!(" neutral ".parse::<EmotionTone>(), Ok(EmotionTone::Neutral));
        assert!("angry".parse::<EmotionTone>().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"code": ":wave:", "description": "greeting", "emotion_tone": "positive"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.priority, MIN_PRIORITY);
        assert_eq!(candidate.emotion_tone, Some(EmotionTone::Positive));
        assert_eq!(candidate.id, 0);
        assert!(candidate.embedding.is_none());
    }
}
