//! Embedding provider port for semantic vector generation.
//!
//! Defines the trait for embedding providers that convert text into
//! dense vector representations for semantic similarity search.

use async_trait::async_trait;

use crate::domain::errors::DependencyError;

/// Trait for text embedding providers.
///
/// Implementations perform exactly one remote attempt per call. Retries,
/// circuit breaking and caching are layered on top by the services.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "static").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DependencyError>;
}
