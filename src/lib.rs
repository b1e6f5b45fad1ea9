//! Emoji Retrieval - resilient semantic retrieval core
//!
//! Ranks curated emoji candidates for a piece of text: the text is embedded,
//! the nearest candidates are fetched from a vector store, and the results
//! are re-ranked by each candidate's curated priority. Both remote
//! dependencies sit behind a circuit breaker with retry, and embeddings are
//! cached with TTL + LRU eviction.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the port traits
//! - **Service Layer** (`services`): Resilience, caching and ranking logic
//! - **Adapters** (`adapters`): OpenAI embeddings, SQLite and in-memory stores
//! - **Infrastructure Layer** (`infrastructure`): Config, logging, wiring
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use emoji_retrieval::{ConfigLoader, RetrievalContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = RetrievalContext::from_config(ConfigLoader::load()?).await?;
//!     let result = ctx.engine.rank("finally shipped it", 3).await?;
//!     println!("{:?}", result.codes());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, Dependency, DependencyError, DomainResult, RetrievalError};
pub use domain::models::{
    BatchReport, Candidate, Config, EmbeddingVector, EmotionTone, RankedMatch, RetrievalResult,
    SearchFilters,
};
pub use domain::ports::{EmbeddingProvider, VectorStore};
pub use infrastructure::{ConfigLoader, LoggerImpl, RetrievalContext};
pub use services::{
    CircuitBreaker, CircuitState, EmbeddingCache, EmbeddingClient, RankOptions, ResilienceGuard,
    RetrievalEngine, RetryPolicy, VectorIndex,
};
