//! Task executor port - the opaque "invoke named task" capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionMode, Message, OutgoingMessage, Priority};

/// Everything a task invocation gets to see about its workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub workflow_id: Uuid,
    pub workflow_type: String,
    pub mode: ExecutionMode,
    pub task: String,
    pub priority: Priority,
    pub attempt: u32,
    /// Messages addressed to this task, drained from the message bus.
    pub inbox: Vec<Message>,
    /// Outputs of completed dependencies, keyed by dependency name.
    pub upstream: BTreeMap<String, serde_json::Value>,
}

/// What a task invocation reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    /// Messages to put on the bus once the task settles.
    #[serde(default)]
    pub messages: Vec<OutgoingMessage>,
}

impl TaskOutcome {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: OutgoingMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// Executes a named task.
///
/// The engine never inspects `output`; it is produced by whatever content,
/// compliance or delivery system sits behind the implementation. An `Err`
/// is treated the same as an unsuccessful outcome.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executor type name, for logs.
    fn name(&self) -> &'static str;

    /// Run `task` to completion.
    async fn execute(&self, task: &str, ctx: &WorkflowContext) -> DomainResult<TaskOutcome>;
}
