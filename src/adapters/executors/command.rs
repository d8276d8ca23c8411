//! Shell command task executor.
//!
//! Each task name maps to a shell command. The workflow context is written
//! to the command's stdin as JSON and its stdout becomes the task output.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::ExecutorSettings;
use crate::domain::ports::{TaskExecutor, TaskOutcome, WorkflowContext};

pub struct CommandExecutor {
    shell: String,
    commands: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(shell: impl Into<String>, commands: BTreeMap<String, String>) -> Self {
        Self {
            shell: shell.into(),
            commands,
            working_dir: None,
        }
    }

    pub fn from_settings(settings: &ExecutorSettings) -> Self {
        Self {
            shell: settings.shell.clone(),
            commands: settings.commands.clone(),
            working_dir: settings.working_dir.clone(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Interpret a command's stdout.
    ///
    /// A JSON object carrying a boolean `success` field is taken as a full
    /// `TaskOutcome` (so commands can emit messages). Any other JSON is the
    /// output of a successful task, and non-JSON text becomes a JSON string.
    fn parse_stdout(stdout: &str) -> TaskOutcome {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return TaskOutcome::success(serde_json::Value::Null);
        }

        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => {
                let is_outcome = value
                    .get("success")
                    .map(serde_json::Value::is_boolean)
                    .unwrap_or(false);
                if is_outcome {
                    if let Ok(outcome) = serde_json::from_value::<TaskOutcome>(value.clone()) {
                        return outcome;
                    }
                }
                TaskOutcome::success(value)
            }
            Err(_) => TaskOutcome::success(serde_json::Value::String(trimmed.to_string())),
        }
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn execute(&self, task: &str, ctx: &WorkflowContext) -> DomainResult<TaskOutcome> {
        let Some(command_line) = self.commands.get(task) else {
            return Ok(TaskOutcome::failure(format!(
                "no command configured for task '{task}'"
            )));
        };

        let input = serde_json::to_vec(ctx)?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command_line)
            .env("CONDUCTOR_WORKFLOW_ID", ctx.workflow_id.to_string())
            .env("CONDUCTOR_TASK", task)
            .env("CONDUCTOR_ATTEMPT", ctx.attempt.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| OrchestrationError::TaskExecution {
            task: task.to_string(),
            message: format!("failed to spawn '{}': {e}", self.shell),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Commands are free to ignore their input.
            if let Err(e) = stdin.write_all(&input).await {
                tracing::debug!(task, error = %e, "command did not read workflow context");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OrchestrationError::TaskExecution {
                task: task.to_string(),
                message: format!("failed to wait for command: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("command exited with {}", output.status)
            } else {
                stderr
            };
            return Ok(TaskOutcome::failure(message));
        }

        Ok(Self::parse_stdout(&String::from_utf8_lossy(&output.stdout)))
    }
}
