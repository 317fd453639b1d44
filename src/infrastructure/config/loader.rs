use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{CacheBackendKind, Config};

/// Project config file, read from the working directory.
pub const CONFIG_FILE: &str = "rowcache.yaml";

/// Optional local overrides, kept out of version control.
pub const LOCAL_CONFIG_FILE: &str = "rowcache.local.yaml";

/// Prefix of environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "ROWCACHE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid min_connections: {0}. Cannot exceed max_connections ({1})")]
    InvalidMinConnections(u32, u32),

    #[error("Cache URL cannot be empty when the redis backend is selected")]
    EmptyCacheUrl,

    #[error("Invalid default_ttl_secs: {0}. Must be at least 1")]
    InvalidTtl(u64),

    #[error("Invalid lock_timeout_ms: {0}. Must be at least 1")]
    InvalidLockTimeout(u64),

    #[error(
        "Invalid lock retry: lock_retry_interval_ms ({0}) must be positive and less than lock_timeout_ms ({1})"
    )]
    InvalidLockRetry(u64, u64),

    #[error("Invalid scan_batch_size: {0}. Must be at least 1")]
    InvalidScanBatchSize(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. rowcache.yaml
    /// 3. rowcache.local.yaml (optional overrides)
    /// 4. Environment variables (ROWCACHE_* prefix, highest priority)
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

    /// Load configuration from a specific file. Environment overrides still apply.
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
        let database = &config.database;
        if database.url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(database.max_connections));
        }
        if database.min_connections > database.max_connections {
            return Err(ConfigError::InvalidMinConnections(
                database.min_connections,
                database.max_connections,
            ));
        }

        let cache = &config.cache;
        match cache.backend {
            CacheBackendKind::Redis if cache.url.trim().is_empty() => {
                return Err(ConfigError::EmptyCacheUrl);
            }
            CacheBackendKind::Memory if cache.memory_capacity == 0 => {
                return Err(ConfigError::ValidationFailed(
                    "memory_capacity must be at least 1 for the memory backend".to_string(),
                ));
            }
            _ => {}
        }
        if cache.default_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl(cache.default_ttl_secs));
        }
        if cache.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidLockTimeout(cache.lock_timeout_ms));
        }
        if cache.lock_retry_interval_ms == 0 || cache.lock_retry_interval_ms >= cache.lock_timeout_ms {
            return Err(ConfigError::InvalidLockRetry(
                cache.lock_retry_interval_ms,
                cache.lock_timeout_ms,
            ));
        }
        if cache.scan_batch_size == 0 {
            return Err(ConfigError::InvalidScanBatchSize(cache.scan_batch_size));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
