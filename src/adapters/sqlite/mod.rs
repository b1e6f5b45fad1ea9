//! SQLite adapters for the candidate vector store.

pub mod connection;
pub mod migrations;
pub mod vector_store;

pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use vector_store::SqliteVectorStore;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::DependencyError;
use crate::domain::models::VectorStoreConfig;

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DependencyError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DependencyError::MalformedResponse(format!("bad timestamp {s:?}: {e}")))
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

pub async fn initialize_database(config: &VectorStoreConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool(&config.database_url, Some(PoolConfig::from(config))).await?;
    let migrator = Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    let migrator = Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    Ok(pool)
}
