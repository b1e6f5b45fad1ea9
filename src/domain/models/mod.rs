//! Domain models: candidates, embeddings, ranking results and configuration.

pub mod candidate;
pub mod config;
pub mod embedding;
pub mod retrieval;

pub use candidate::{Candidate, CandidateError, EmotionTone, MAX_PRIORITY, MIN_PRIORITY};
pub use config::{
    CacheConfig, Config, EmbeddingConfig, GuardConfig, LogFormat, LoggingConfig,
    ResilienceConfig, RetrievalConfig, RotationPolicy, VectorStoreConfig,
};
pub use embedding::{canonicalize, cosine_distance, EmbeddingVector, DEFAULT_EMBEDDING_DIMENSION};
pub use retrieval::{
    BatchFailure, BatchReport, RankedMatch, RetrievalResult, SearchFilters, SearchHit,
};
