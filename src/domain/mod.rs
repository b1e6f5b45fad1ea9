//! Domain layer for the emoji retrieval core
//!
//! This module contains the core models, error taxonomy and port traits.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ConfigError, Dependency, DependencyError, DomainResult, RetrievalError};
