//! Services: resilience, caching, vector search and ranking.

pub mod circuit_breaker;
pub mod embedding_cache;
pub mod embedding_client;
pub mod resilience_guard;
pub mod retrieval_engine;
pub mod retry;
pub mod vector_index;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use embedding_cache::{CacheStats, EmbeddingCache};
pub use embedding_client::EmbeddingClient;
pub use resilience_guard::ResilienceGuard;
pub use retrieval_engine::{rank_hits, RankOptions, RetrievalEngine, DEFAULT_LIMIT};
pub use retry::{RetryFailure, RetryPolicy};
pub use vector_index::VectorIndex;
