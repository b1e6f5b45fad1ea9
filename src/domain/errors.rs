//! Error taxonomy for the retrieval core.
//!
//! Adapters speak [`DependencyError`]; the services above them only ever
//! surface [`RetrievalError`], a closed enum callers can match exhaustively.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The remote collaborator an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Text embedding provider (e.g. the OpenAI embeddings endpoint).
    EmbeddingProvider,
    /// Vector store holding candidates and their embeddings.
    VectorStore,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddingProvider => "embedding_provider",
            Self::VectorStore => "vector_store",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an adapter for a single remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// HTTP 429 or an equivalent throttling signal.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The request itself timed out.
    #[error("request timed out")]
    Timeout,

    /// The caller-supplied deadline passed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// 5xx responses, closed pools and similar temporary outages.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Credentials were refused (HTTP 401/403).
    #[error("authentication failed")]
    Authentication,

    /// The dependency rejected the input as malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other non-retryable refusal (unknown model, missing row, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The dependency answered but the payload could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl DependencyError {
    /// Returns true if a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Timeout
                | Self::DeadlineExceeded
                | Self::Unavailable(_)
                | Self::Connection(_)
        )
    }

    /// Returns true if retrying the same request is pointless.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid embedding dimension: {0}. Must be at least 1")]
    InvalidDimension(usize),

    #[error("Invalid oversample factor: {0}. Must be at least 2")]
    InvalidOversampleFactor(usize),

    #[error("Invalid cache capacity: {0}. Must be at least 1")]
    InvalidCacheCapacity(usize),

    #[error("Invalid failure threshold for {0}: must be at least 1")]
    InvalidFailureThreshold(Dependency),

    #[error("Invalid max_attempts for {0}: must be at least 1")]
    InvalidMaxAttempts(Dependency),

    #[error(
        "Invalid backoff configuration for {dependency}: base_delay_ms ({base}) must not exceed max_delay_ms ({max})"
    )]
    InvalidBackoff { dependency: Dependency, base: u64, max: u64 },

    #[error("Invalid jitter for {dependency}: {jitter}. Must be within [0, 1]")]
    InvalidJitter { dependency: Dependency, jitter: f64 },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors surfaced by the retrieval core to its callers.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Startup/configuration problem; not recoverable at call time.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A retryable failure that persisted through every attempt.
    #[error("{dependency} failed after {attempts} attempt(s): {source}")]
    Transient {
        dependency: Dependency,
        attempts: u32,
        #[source]
        source: DependencyError,
    },

    /// A non-retryable failure, surfaced on the first occurrence.
    #[error("{dependency} rejected the request: {source}")]
    Permanent {
        dependency: Dependency,
        #[source]
        source: DependencyError,
    },

    /// The dependency's breaker is open; nothing was sent.
    #[error("{dependency} circuit is open (retry after {retry_after:?})")]
    CircuitOpen {
        dependency: Dependency,
        retry_after: Duration,
    },

    /// An embedding had the wrong number of components.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl RetrievalError {
    /// Fast-fail while a breaker is open. Callers typically skip quietly
    /// instead of treating this as a hard failure.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Dependency the error came from, if any.
    pub fn dependency(&self) -> Option<Dependency> {
        match self {
            Self::Transient { dependency, .. }
            | Self::Permanent { dependency, .. }
            | Self::CircuitOpen { dependency, .. } => Some(*dependency),
            Self::Configuration(_) | Self::DimensionMismatch { .. } => None,
        }
    }

    /// Short machine-readable tag, used in structured logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transient { .. } => "transient",
            Self::Permanent { .. } => "permanent",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

pub type DomainResult<T> = Result<T, RetrievalError>;
