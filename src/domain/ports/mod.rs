//! Port traits the retrieval services depend on.

pub mod embedding;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use vector_store::VectorStore;
