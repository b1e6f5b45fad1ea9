//! Embedding provider adapters.

pub mod openai;
pub mod scripted;

pub use openai::OpenAiEmbeddingProvider;
pub use scripted::ScriptedEmbeddingProvider;
