//! Conductor - dependency-aware workflow orchestrator
//!
//! Conductor runs a named set of tasks (agents) in dependency order. Tasks
//! are grouped into phases; every task in a phase depends only on tasks in
//! earlier phases. Phases run one after another, and the tasks inside a
//! phase run sequentially, all at once, or under a priority-ordered
//! concurrency cap.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): resolver, state tracker, message bus,
//!   execution engine and the orchestration API
//! - **Adapters** (`adapters`): executors, notifiers, SQLite and in-memory
//!   persistence
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use conductor::services::{Orchestrator, OrchestrateRequest};
//!
//! let summary = orchestrator
//!     .orchestrate(OrchestrateRequest::new().with_mode(ExecutionMode::Parallel))
//!     .await?;
//! println!("{} tasks succeeded", summary.succeeded.len());
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainResult, OrchestrationError};
pub use domain::models::{
    Config, ExecutionMode, ExecutionPlan, Message, MessageType, Priority, TaskDefinition,
    TaskRegistry, TaskState, TaskStatus, Workflow, WorkflowAction, WorkflowStatus,
    WorkflowSummary,
};
pub use domain::ports::{EventNotifier, MessageLog, TaskEvent, TaskExecutor, WorkflowStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    DependencyResolver, ExecutionEngine, MessageBus, OrchestrateRequest, Orchestrator,
    TaskStateTracker,
};
