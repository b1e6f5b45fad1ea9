//! Embedding vectors and the text canonicalization used to key them.

use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

use crate::domain::errors::RetrievalError;

/// Dimension of `text-embedding-3-small`, the default provider model.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// A fixed-length embedding.
///
/// Only constructible through [`EmbeddingVector::new`], which rejects any
/// length other than the expected dimension. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Arc<[f32]>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>, expected_dimension: usize) -> Result<Self, RetrievalError> {
        if values.len() != expected_dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: expected_dimension,
                actual: values.len(),
            });
        }
        Ok(Self(values.into()))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Canonical form used for cache keys: NFKC, lowercase, trimmed, with
/// whitespace runs collapsed to a single space.
pub fn canonicalize(text: &str) -> String {
    let normalized: String = text.nfkc().collect::<String>().to_lowercase();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace without changing case. This is what gets sent to
/// the provider.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cosine distance (`1 - cosine similarity`), lower is closer.
///
/// Returns `f32::MAX` for mismatched lengths or zero-magnitude inputs.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return f32::MAX;
    }

    1.0 - (dot / (mag_a * mag_b))
}

/// Little-endian f32 encoding used for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]. `None` if the length is not a
/// multiple of four.
pub fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
