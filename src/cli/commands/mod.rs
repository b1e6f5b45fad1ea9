//! CLI command implementations.

pub mod export;
pub mod import;
pub mod rank;
pub mod status;
pub mod vectorize;
