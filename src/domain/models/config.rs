use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::registry::{WorkflowType, CONTENT_WORKFLOW};
use super::workflow::ExecutionMode;

/// Main configuration structure for conductor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Execution engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Task executor configuration
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Extra workflow types, merged over the built-in registry
    #[serde(default)]
    pub workflows: Vec<WorkflowType>,

    /// Workflow type used when none is requested
    #[serde(default = "default_workflow")]
    pub default_workflow: String,
}

fn default_workflow() -> String {
    CONTENT_WORKFLOW.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            notifier: NotifierConfig::default(),
            executor: ExecutorSettings::default(),
            workflows: vec![],
            default_workflow: default_workflow(),
        }
    }
}

/// What happens to dependents of a failed, non-critical task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentFailurePolicy {
    /// Dispatch dependents anyway; they see no upstream output.
    #[default]
    Proceed,
    /// Mark every transitive dependent as skipped.
    Skip,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Maximum concurrent task invocations in intelligent mode
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-task invocation timeout in seconds
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Handling of dependents when a task fails
    #[serde(default)]
    pub dependent_failure_policy: DependentFailurePolicy,

    /// Mode used when a run does not specify one
    #[serde(default)]
    pub default_mode: ExecutionMode,
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_task_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            dependent_failure_policy: DependentFailurePolicy::default(),
            default_mode: ExecutionMode::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".conductor/conductor.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
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
    pub format: String,

    /// Directory for rolling JSON log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Event notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotifierConfig {
    /// Whether task events are announced at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Shell command run for each event; the event text is appended as the
    /// last argument (e.g. a text-to-speech tool)
    #[serde(default)]
    pub command: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

/// Which task executor backs the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Run the configured shell command per task
    #[default]
    Command,
    /// Succeed immediately without doing anything
    Noop,
}

/// Task executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorSettings {
    #[serde(default)]
    pub kind: ExecutorKind,

    /// Task name to shell command
    #[serde(default)]
    pub commands: BTreeMap<String, String>,

    /// Working directory for commands
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Shell used to run commands
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            commands: BTreeMap::new(),
            working_dir: None,
            shell: default_shell(),
        }
    }
}
