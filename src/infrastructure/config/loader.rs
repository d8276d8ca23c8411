use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".conductor";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "CONDUCTOR_";

const MAX_CONCURRENCY_LIMIT: usize = 256;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrency: {0}. Must be between 1 and {MAX_CONCURRENCY_LIMIT}")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid task_timeout_secs: {0}. Must be positive")]
    InvalidTaskTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

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
    /// 2. .conductor/config.yaml (project config, written by `conductor init`)
    /// 3. .conductor/local.yaml (local overrides, optional)
    /// 4. Environment variables (CONDUCTOR_* prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(Path::new(CONFIG_DIR).join("config.yaml")))
            .merge(Yaml::file(Path::new(CONFIG_DIR).join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// Environment variables still override values from the file.
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
        let engine = &config.engine;
        if engine.max_concurrency == 0 || engine.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::InvalidMaxConcurrency(engine.max_concurrency));
        }

        if engine.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTaskTimeout(engine.task_timeout_secs));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "logging.rotation must be one of daily, hourly, never (got '{}')",
                config.logging.rotation
            )));
        }

        if config.default_workflow.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_workflow cannot be empty".to_string(),
            ));
        }

        if config.executor.shell.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "executor.shell cannot be empty".to_string(),
            ));
        }

        if let Some(command) = &config.notifier.command {
            if command.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "notifier.command cannot be blank".to_string(),
                ));
            }
        }

        for workflow in &config.workflows {
            if workflow.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "workflow name cannot be empty".to_string(),
                ));
            }
            if workflow.tasks.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "workflow '{}' declares no tasks",
                    workflow.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DependentFailurePolicy, ExecutionMode, ExecutorKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.max_concurrency, 4);
        assert_eq!(config.engine.task_timeout_secs, 300);
        assert_eq!(config.database.path, ".conductor/conductor.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.default_workflow, "content");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
engine:
  max_concurrency: 8
  task_timeout_secs: 30
  dependent_failure_policy: skip
  default_mode: parallel
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
executor:
  kind: noop
workflows:
  - name: release
    tasks:
      - name: build
      - name: publish
        dependencies: [build]
        priority: critical
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(
            config.engine.dependent_failure_policy,
            DependentFailurePolicy::Skip
        );
        assert_eq!(config.engine.default_mode, ExecutionMode::Parallel);
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.executor.kind, ExecutorKind::Noop);
        assert_eq!(config.workflows.len(), 1);
        assert!(config.workflows[0].tasks[1].dependencies.contains("build"));

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let mut config = Config::default();
        config.engine.max_concurrency = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrency(0))
        ));

        config.engine.max_concurrency = 257;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrency(257))
        ));

        config.engine.max_concurrency = 256;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.engine.task_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTaskTimeout(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_blank_notifier_command() {
        let mut config = Config::default();
        config.notifier.command = Some("  ".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_load_from_file_merges_defaults() {
        let file = yaml_file("engine:\n  max_concurrency: 2\nlogging:\n  level: warn\n");

        temp_env::with_vars_unset(
            ["CONDUCTOR_ENGINE__MAX_CONCURRENCY", "CONDUCTOR_LOGGING__LEVEL"],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.engine.max_concurrency, 2);
                assert_eq!(config.engine.task_timeout_secs, 300);
                assert_eq!(config.logging.level, "warn");
                assert_eq!(config.logging.format, "pretty");
            },
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let file = yaml_file("engine:\n  max_concurrency: 2\n");

        temp_env::with_vars(
            [
                ("CONDUCTOR_ENGINE__MAX_CONCURRENCY", Some("16")),
                ("CONDUCTOR_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.engine.max_concurrency, 16);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let file = yaml_file("engine:\n  max_concurrency: 0\n");

        temp_env::with_var_unset("CONDUCTOR_ENGINE__MAX_CONCURRENCY", || {
            let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
            assert!(err.to_string().contains("max_concurrency"));
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ConfigLoader::load_from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("engine:\n  max_concurrency: 5\nlogging:\n  level: info\n  format: json\n");
        let local = yaml_file("engine:\n  max_concurrency: 15\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(local.path()))
            .extract()
            .unwrap();

        assert_eq!(config.engine.max_concurrency, 15, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
