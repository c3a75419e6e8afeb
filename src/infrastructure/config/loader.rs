use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid claim_lease_seconds: {0}. Must be positive")]
    InvalidLeaseSeconds(i64),

    #[error("invalid acquire_batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("database_url cannot be empty")]
    EmptyDatabaseUrl,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `.scheduler/config.yaml` (project config)
    /// 3. `.scheduler/local.yaml` (project local overrides, optional)
    /// 4. Environment variables (`SCHEDULER_` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".scheduler/config.yaml"))
            .merge(Yaml::file(".scheduler/local.yaml"))
            .merge(Env::prefixed("SCHEDULER_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the project
    /// default/local file search. Used by the CLI's `--config` flag.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SCHEDULER_").split("__"))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.claim_lease_seconds <= 0 {
            return Err(ConfigError::InvalidLeaseSeconds(config.claim_lease_seconds));
        }

        if config.acquire_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.acquire_batch_size));
        }

        if config.database_url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.start_worker);
        assert_eq!(config.acquire_batch_size, 100);
        assert_eq!(config.claim_lease_seconds, 30);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_override_wins_over_defaults() {
        let yaml = "start_worker: false\nacquire_batch_size: 25\n";
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
            .unwrap();

        assert!(!config.start_worker);
        assert_eq!(config.acquire_batch_size, 25);
        assert_eq!(config.claim_lease_seconds, 30, "unset fields keep their default");
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = Config {
            acquire_batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn rejects_non_positive_lease() {
        let config = Config {
            claim_lease_seconds: 0,
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLeaseSeconds(0))
        ));
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn env_override() {
        temp_env::with_var("SCHEDULER_ACQUIRE_BATCH_SIZE", Some("42"), || {
            let config: Config = Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Env::prefixed("SCHEDULER_").split("__"))
                .extract()
                .unwrap();
            assert_eq!(config.acquire_batch_size, 42);
        });
    }
}
