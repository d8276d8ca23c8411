//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across multiple integration test files.

#![allow(dead_code)]

use std::sync::Arc;

use conductor::adapters::executors::{ScriptedExecutor, ScriptedResponse};
use conductor::adapters::memory::{InMemoryMessageLog, InMemoryWorkflowStore};
use conductor::domain::models::{TaskDefinition, TaskRegistry, WorkflowType};
use conductor::domain::ports::{EventNotifier, WorkflowStore};
use conductor::services::{ExecutionEngine, ExecutorConfig, MessageBus, Orchestrator};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Built-in registry plus a "diamond" type:
/// `a`, `b` -> `c` -> `d`.
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::builtin();
    registry
        .register(
            WorkflowType::new("diamond", "two roots feeding a join")
                .with_task(TaskDefinition::new("a"))
                .with_task(TaskDefinition::new("b"))
                .with_task(TaskDefinition::new("c").with_dependencies(["a", "b"]))
                .with_task(TaskDefinition::new("d").with_dependencies(["c"])),
        )
        .expect("diamond registers");
    registry
}

/// Everything a test needs to drive and inspect a run.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub executor: Arc<ScriptedExecutor>,
    pub store: Arc<InMemoryWorkflowStore>,
    pub bus: MessageBus,
}

pub struct HarnessBuilder {
    registry: TaskRegistry,
    executor: ScriptedExecutor,
    config: ExecutorConfig,
    notifier: Option<Arc<dyn EventNotifier>>,
    default_workflow: String,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            registry: registry(),
            executor: ScriptedExecutor::new(),
            config: ExecutorConfig::default(),
            notifier: None,
            default_workflow: "content".to_string(),
        }
    }

    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the default response; call before `respond`.
    pub fn default_response(mut self, response: ScriptedResponse) -> Self {
        self.executor = ScriptedExecutor::with_default_response(response);
        self
    }

    pub fn respond(mut self, task: &str, response: ScriptedResponse) -> Self {
        self.executor = self.executor.with_response(task, response);
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn default_workflow(mut self, name: &str) -> Self {
        self.default_workflow = name.to_string();
        self
    }

    pub fn build(self) -> Harness {
        let executor = Arc::new(self.executor);
        let store = Arc::new(InMemoryWorkflowStore::new());
        let bus = MessageBus::new(Arc::new(InMemoryMessageLog::new()));

        let store_port: Arc<dyn WorkflowStore> = store.clone();
        let mut engine = ExecutionEngine::new(
            executor.clone(),
            bus.clone(),
            store_port.clone(),
            self.config,
        );
        if let Some(notifier) = self.notifier {
            engine = engine.with_notifier(notifier);
        }

        let orchestrator = Orchestrator::new(self.registry, engine, store_port, bus.clone())
            .with_default_workflow(self.default_workflow);

        Harness {
            orchestrator,
            executor,
            store,
            bus,
        }
    }
}
