//! Domain errors for the conductor orchestration engine.

use thiserror::Error;
use uuid::Uuid;

/// Format a cycle path as a human-readable string: `a -> b -> a`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Domain-level errors that can occur while orchestrating a workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Task '{task}' depends on '{dependency}', which is not part of the requested task set")]
    UnknownDependency { task: String, dependency: String },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error("Duplicate task definition: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' failed: {message}")]
    TaskExecution { task: String, message: String },

    #[error("Task '{task}' timed out after {timeout_ms}ms")]
    TaskTimeout { task: String, timeout_ms: u64 },

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("No workflow has been started yet")]
    NoWorkflow,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cannot {action} a workflow that is {status}")]
    InvalidAction { action: String, status: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrchestrationError {
    /// Errors raised while resolving the task graph. They fail the whole
    /// workflow before any task is dispatched.
    pub fn is_workflow_fatal(&self) -> bool {
        matches!(
            self,
            Self::DependencyCycle(_) | Self::UnknownDependency { .. }
        )
    }

    /// Whether this error came out of a single task invocation.
    pub fn is_task_error(&self) -> bool {
        matches!(self, Self::TaskExecution { .. } | Self::TaskTimeout { .. })
    }
}

pub type DomainResult<T> = Result<T, OrchestrationError>;

impl From<sqlx::Error> for OrchestrationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_renders_path() {
        let err = OrchestrationError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Task dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(OrchestrationError::DependencyCycle(vec![]).is_workflow_fatal());
        assert!(OrchestrationError::UnknownDependency {
            task: "c".into(),
            dependency: "x".into()
        }
        .is_workflow_fatal());
        assert!(!OrchestrationError::Persistence("disk".into()).is_workflow_fatal());

        let timeout = OrchestrationError::TaskTimeout {
            task: "a".into(),
            timeout_ms: 5000,
        };
        assert!(timeout.is_task_error());
        assert!(!timeout.is_workflow_fatal());
    }
}
