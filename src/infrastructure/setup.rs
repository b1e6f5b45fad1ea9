//! Runtime wiring
//!
//! Builds the retrieval stack from a loaded [`Config`]:
//! - OpenAI embedding provider behind its own resilience guard
//! - SQLite vector store (migrated on open) behind a second guard
//! - Shared embedding cache
//! - Retrieval engine on top

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::sqlite::initialize_database;
use crate::adapters::{OpenAiEmbeddingProvider, SqliteVectorStore};
use crate::domain::errors::{ConfigError, Dependency};
use crate::domain::models::Config;
use crate::domain::ports::{EmbeddingProvider, VectorStore};
use crate::services::{
    CircuitSnapshot, EmbeddingCache, EmbeddingClient, ResilienceGuard, RetrievalEngine,
    VectorIndex,
};

/// Everything a command needs, built once per process.
pub struct RetrievalContext {
    pub config: Config,
    pub engine: Arc<RetrievalEngine>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalContext {
    /// Build the production stack: OpenAI provider and SQLite store.
    ///
    /// A missing API key or an unreachable database fails here, before any
    /// request is served.
    pub async fn from_config(config: Config) -> Result<Self> {
        let provider = OpenAiEmbeddingProvider::new(config.embedding.clone())
            .context("Failed to configure embedding provider")?;

        let pool = initialize_database(&config.vector_store)
            .await
            .context("Failed to initialize candidate database")?;

        info!(
            provider = provider.name(),
            model = %config.embedding.model,
            dimension = config.embedding.dimension,
            database = %config.vector_store.database_url,
            "Retrieval stack initialized"
        );

        let ctx = Self::with_components(
            config,
            Arc::new(provider),
            Arc::new(SqliteVectorStore::new(pool)),
        )?;
        Ok(ctx)
    }

    /// Wire the stack around explicit provider and store implementations.
    ///
    /// Fails when the provider's dimension disagrees with
    /// `embedding.dimension`.
    pub fn with_components(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, ConfigError> {
        let dimension = config.embedding.dimension;
        if provider.dimension() != dimension {
            return Err(ConfigError::ValidationFailed(format!(
                "embedding provider '{}' produces {}-dimensional vectors but embedding.dimension is {}",
                provider.name(),
                provider.dimension(),
                dimension
            )));
        }

        let cache = Arc::new(EmbeddingCache::from_config(&config.cache));
        let embedding_guard = Arc::new(ResilienceGuard::from_config(
            Dependency::EmbeddingProvider,
            &config.resilience.embedding,
        ));
        let store_guard = Arc::new(ResilienceGuard::from_config(
            Dependency::VectorStore,
            &config.resilience.vector_store,
        ));

        let embeddings = Arc::new(EmbeddingClient::new(
            provider,
            cache,
            embedding_guard,
            dimension,
        ));
        let index = Arc::new(
            VectorIndex::new(Arc::clone(&store), store_guard, dimension)
                .with_oversample_factor(config.retrieval.oversample_factor),
        );

        Ok(Self {
            engine: Arc::new(RetrievalEngine::new(embeddings, index)),
            config,
            store,
        })
    }

    /// The raw store; callers outside the engine go through [`Self::store_guard`].
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Guard shared with the vector index, so CLI maintenance calls count
    /// against the same breaker as searches.
    pub fn store_guard(&self) -> &ResilienceGuard {
        self.engine.index().guard()
    }

    /// Breaker snapshots, embedding provider first.
    pub fn circuits(&self) -> Vec<CircuitSnapshot> {
        vec![
            self.engine.embeddings().guard().snapshot(),
            self.engine.index().guard().snapshot(),
        ]
    }
}
