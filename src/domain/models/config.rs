use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::embedding::DEFAULT_EMBEDDING_DIMENSION;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Embedding cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker and retry settings, one block per dependency
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Ranking configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Embedding provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Expected embedding dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VectorStoreConfig {
    /// `SQLite` database URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite:.emoji-retrieval/candidates.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Embedding cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum number of cached embeddings
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,

    /// Time-to-live for each entry, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

const fn default_cache_entries() -> usize {
    1000
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Per-dependency resilience settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResilienceConfig {
    #[serde(default)]
    pub embedding: GuardConfig,

    #[serde(default)]
    pub vector_store: GuardConfig,
}

/// Circuit breaker + retry settings for one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardConfig {
    /// Consecutive failed calls before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial call
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Total attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds (doubles per retry)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomization factor applied to each delay, within `[0, 1]`
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

const fn default_jitter() -> f64 {
    0.5
}

impl GuardConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

/// Ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Number of matches returned when the caller does not specify one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Multiplier applied to the requested limit when querying the store
    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,
}

const fn default_limit() -> usize {
    3
}

const fn default_oversample_factor() -> usize {
    2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            oversample_factor: default_oversample_factor(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file output
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
