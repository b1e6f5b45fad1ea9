use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::{ConfigError, Dependency};
use crate::domain::models::config::{Config, GuardConfig};

/// Project config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "emoji-retrieval.yaml";

/// Optional local overrides, usually git-ignored.
pub const LOCAL_CONFIG_FILE: &str = "emoji-retrieval.local.yaml";

/// Prefix for environment overrides; `__` separates nested keys, e.g.
/// `EMOJI_RETRIEVAL_CACHE__MAX_ENTRIES=500`.
pub const ENV_PREFIX: &str = "EMOJI_RETRIEVAL_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. emoji-retrieval.yaml (project config)
    /// 3. emoji-retrieval.local.yaml (local overrides, optional)
    /// 4. Environment variables (EMOJI_RETRIEVAL_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment variables still
    /// take precedence over the file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Embedding provider
        if config.embedding.dimension == 0 {
            return Err(ConfigError::InvalidDimension(config.embedding.dimension));
        }
        if config.embedding.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "embedding.model cannot be empty".to_string(),
            ));
        }
        if config.embedding.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "embedding.base_url cannot be empty".to_string(),
            ));
        }

        // Vector store
        if config.vector_store.database_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "vector_store.database_url cannot be empty".to_string(),
            ));
        }

        // Cache
        if config.cache.max_entries == 0 {
            return Err(ConfigError::InvalidCacheCapacity(config.cache.max_entries));
        }
        if config.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "cache.ttl_secs must be at least 1".to_string(),
            ));
        }

        // Retrieval
        if config.retrieval.oversample_factor < 2 {
            return Err(ConfigError::InvalidOversampleFactor(
                config.retrieval.oversample_factor,
            ));
        }

        // Resilience
        Self::validate_guard(Dependency::EmbeddingProvider, &config.resilience.embedding)?;
        Self::validate_guard(Dependency::VectorStore, &config.resilience.vector_store)?;

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }

    fn validate_guard(dependency: Dependency, guard: &GuardConfig) -> Result<(), ConfigError> {
        if guard.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(dependency));
        }
        if guard.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(dependency));
        }
        if guard.base_delay_ms > guard.max_delay_ms {
            return Err(ConfigError::InvalidBackoff {
                dependency,
                base: guard.base_delay_ms,
                max: guard.max_delay_ms,
            });
        }
        if !(0.0..=1.0).contains(&guard.jitter) {
            return Err(ConfigError::InvalidJitter {
                dependency,
                jitter: guard.jitter,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.retrieval.default_limit, 3);
        assert_eq!(config.retrieval.oversample_factor, 2);
        assert_eq!(config.resilience.embedding.failure_threshold, 5);
        assert_eq!(config.resilience.vector_store.cooldown_secs, 30);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
embedding:
  model: text-embedding-3-large
  dimension: 3072
cache:
  max_entries: 50
  ttl_secs: 120
resilience:
  embedding:
    failure_threshold: 3
    jitter: 0.2
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.embedding.dimension, 3072);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.resilience.embedding.failure_threshold, 3);
        // Unset fields keep their defaults.
        assert_eq!(config.resilience.embedding.max_attempts, 3);
        assert_eq!(config.resilience.vector_store.failure_threshold, 5);
        assert_eq!(config.logging.format, LogFormat::Json);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let yaml = "logging:\n  format: xml\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_validate_rejections() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDimension(0))
        ));

        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCacheCapacity(0))
        ));

        let mut config = Config::default();
        config.retrieval.oversample_factor = 1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidOversampleFactor(1))
        ));

        let mut config = Config::default();
        config.resilience.vector_store.failure_threshold = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFailureThreshold(Dependency::VectorStore))
        ));

        let mut config = Config::default();
        config.resilience.embedding.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAttempts(Dependency::EmbeddingProvider))
        ));

        let mut config = Config::default();
        config.resilience.embedding.base_delay_ms = 10_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff { base: 10_000, max: 5_000, .. })
        ));

        let mut config = Config::default();
        config.resilience.embedding.jitter = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidJitter { .. })
        ));

        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));

        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));

        let mut config = Config::default();
        config.vector_store.database_url = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config("cache:\n  max_entries: 42\nretrieval:\n  default_limit: 5\n");

        temp_env::with_vars_unset(
            ["EMOJI_RETRIEVAL_CACHE__MAX_ENTRIES", "EMOJI_RETRIEVAL_LOGGING__LEVEL"],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.cache.max_entries, 42);
                assert_eq!(config.retrieval.default_limit, 5);
                assert_eq!(config.cache.ttl_secs, 3600);
            },
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("cache:\n  max_entries: 42\nlogging:\n  level: warn\n");

        temp_env::with_vars(
            [
                ("EMOJI_RETRIEVAL_CACHE__MAX_ENTRIES", Some("7")),
                ("EMOJI_RETRIEVAL_RESILIENCE__EMBEDDING__COOLDOWN_SECS", Some("5")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.cache.max_entries, 7, "Env should win over file");
                assert_eq!(config.resilience.embedding.cooldown_secs, 5);
                assert_eq!(config.logging.level, "warn", "File value should persist");
            },
        );
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let file = write_config("retrieval:\n  oversample_factor: 1\n");
        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("oversample factor"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/emoji-retrieval.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = write_config("cache:\n  max_entries: 5\nlogging:\n  level: info\n  format: json\n");
        let local = write_config("cache:\n  max_entries: 15\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(local.path()))
            .extract()
            .unwrap();

        assert_eq!(config.cache.max_entries, 15, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(
            config.logging.format,
            LogFormat::Json,
            "Base value should persist when not overridden"
        );
    }
}
