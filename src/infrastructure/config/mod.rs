//! Configuration loading
//!
//! Hierarchical configuration via figment: defaults, project yaml files,
//! then `CONDUCTOR_*` environment variables.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
