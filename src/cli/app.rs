//! Wiring of configuration into a ready-to-use orchestrator.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::executors::{CommandExecutor, NoopExecutor};
use crate::adapters::memory::{InMemoryMessageLog, InMemoryWorkflowStore};
use crate::adapters::notifiers::{CommandNotifier, CompositeNotifier, TracingNotifier};
use crate::adapters::sqlite::{initialize_database, SqliteMessageLog, SqliteWorkflowStore};
use crate::domain::models::{Config, ExecutorKind, ExecutorSettings, NotifierConfig, TaskRegistry};
use crate::domain::ports::{EventNotifier, MessageLog, TaskExecutor, WorkflowStore};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{ExecutionEngine, ExecutorConfig, MessageBus, Orchestrator};

/// Load configuration from `path`, or from the project directory when no
/// path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")
}

pub fn build_registry(config: &Config) -> Result<TaskRegistry> {
    TaskRegistry::from_config(config).context("Invalid workflow definitions in configuration")
}

pub fn build_executor(settings: &ExecutorSettings) -> Arc<dyn TaskExecutor> {
    match settings.kind {
        ExecutorKind::Command => Arc::new(CommandExecutor::from_settings(settings)),
        ExecutorKind::Noop => Arc::new(NoopExecutor::new()),
    }
}

/// Log notifier, plus the configured command notifier if there is one.
/// `None` when notifications are disabled.
pub fn build_notifier(config: &NotifierConfig) -> Option<Arc<dyn EventNotifier>> {
    if !config.enabled {
        return None;
    }

    let mut composite = CompositeNotifier::new().with(Arc::new(TracingNotifier::new()));
    if let Some(command) = &config.command {
        composite = composite.with(Arc::new(CommandNotifier::new(command.clone())));
    }
    Some(Arc::new(composite))
}

/// Build an orchestrator backed by SQLite, or by memory when `ephemeral`.
pub async fn build_orchestrator(config: &Config, ephemeral: bool) -> Result<Orchestrator> {
    let registry = build_registry(config)?;

    let (store, log): (Arc<dyn WorkflowStore>, Arc<dyn MessageLog>) = if ephemeral {
        (
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryMessageLog::new()),
        )
    } else {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        (
            Arc::new(SqliteWorkflowStore::new(pool.clone())),
            Arc::new(SqliteMessageLog::new(pool)),
        )
    };

    let bus = MessageBus::new(log);
    let mut engine = ExecutionEngine::new(
        build_executor(&config.executor),
        bus.clone(),
        store.clone(),
        ExecutorConfig::from(&config.engine),
    );
    if let Some(notifier) = build_notifier(&config.notifier) {
        engine = engine.with_notifier(notifier);
    }

    Ok(Orchestrator::new(registry, engine, store, bus)
        .with_default_workflow(config.default_workflow.clone())
        .with_default_mode(config.engine.default_mode))
}
