//! Infrastructure layer module
//!
//! Process-level concerns around the retrieval core:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Wiring adapters and services into a runnable stack

pub mod config;
pub mod logging;
pub mod setup;

pub use config::ConfigLoader;
pub use logging::LoggerImpl;
pub use setup::RetrievalContext;
