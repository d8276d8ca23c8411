//! Executor that succeeds immediately without doing anything.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{TaskExecutor, TaskOutcome, WorkflowContext};

/// Dry-run executor: every task succeeds with a small marker output.
#[derive(Debug, Clone, Default)]
pub struct NoopExecutor;

impl NoopExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskExecutor for NoopExecutor {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn execute(&self, task: &str, ctx: &WorkflowContext) -> DomainResult<TaskOutcome> {
        tracing::debug!(task, workflow_id = %ctx.workflow_id, "noop execution");
        Ok(TaskOutcome::success(serde_json::json!({
            "task": task,
            "dry_run": true,
        })))
    }
}
