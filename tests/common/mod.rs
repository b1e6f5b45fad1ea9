//! Common test utilities for integration tests
//!
//! Helpers for building a retrieval stack over the in-memory store with a
//! scripted embedding provider.

#![allow(dead_code)]

use std::sync::Arc;

use emoji_retrieval::adapters::{InMemoryVectorStore, ScriptedEmbeddingProvider};
use emoji_retrieval::{Candidate, Config, RetrievalContext, VectorStore};

pub const DIM: usize = 3;

/// Scripted provider producing `DIM`-sized vectors; unknown texts embed to
/// `[1, 0, 0]`.
pub fn scripted() -> ScriptedEmbeddingProvider {
    ScriptedEmbeddingProvider::new(DIM)
}

/// Config sized for the fixtures: 3-dimensional vectors, single-attempt
/// calls and no jitter so breaker counts are exact.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimension = DIM;
    for guard in [
        &mut config.resilience.embedding,
        &mut config.resilience.vector_store,
    ] {
        guard.max_attempts = 1;
        guard.jitter = 0.0;
    }
    config
}

/// Stack over the given provider and a fresh in-memory store.
pub fn build_stack(
    config: Config,
    provider: Arc<ScriptedEmbeddingProvider>,
) -> (RetrievalContext, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let ctx = RetrievalContext::with_components(config, provider, store.clone()).unwrap();
    (ctx, store)
}

/// Insert candidates into the store and return them with assigned ids.
pub async fn seed(ctx: &RetrievalContext, candidates: Vec<Candidate>) -> Vec<Candidate> {
    ctx.store().insert_candidates(&candidates).await.unwrap()
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
