//! Adapters implementing the domain ports.

pub mod embeddings;
pub mod memory;
pub mod sqlite;

pub use embeddings::{OpenAiEmbeddingProvider, ScriptedEmbeddingProvider};
pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;
