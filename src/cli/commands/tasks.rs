//! Implementation of the `conductor tasks` command.

use anyhow::Result;
use clap::Args;

use crate::cli::app;
use crate::cli::output::{colorize_priority, output, table, CommandOutput};
use crate::domain::models::{Config, TaskRegistry};

#[derive(Args, Debug)]
pub struct TasksArgs {
    /// Workflow type (defaults to the configured default)
    #[arg(short, long)]
    pub workflow: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct TaskRow {
    name: String,
    priority: String,
    dependencies: Vec<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct TasksOutput {
    workflow_type: String,
    description: String,
    tasks: Vec<TaskRow>,
    available_types: Vec<String>,
}

impl CommandOutput for TasksOutput {
    fn to_human(&self) -> String {
        let mut t = table(["Task", "Priority", "Depends on", "Timeout"]);
        for task in &self.tasks {
            t.add_row(vec![
                task.name.clone(),
                colorize_priority(&task.priority).to_string(),
                if task.dependencies.is_empty() {
                    "-".to_string()
                } else {
                    task.dependencies.join(", ")
                },
                task.timeout_secs
                    .map_or_else(|| "default".to_string(), |s| format!("{s}s")),
            ]);
        }

        let mut lines = vec![format!("Workflow type: {}", self.workflow_type)];
        if !self.description.is_empty() {
            lines.push(self.description.clone());
        }
        lines.push(t.to_string());
        lines.push(format!("Available types: {}", self.available_types.join(", ")));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: TasksArgs, config: &Config, json_mode: bool) -> Result<()> {
    let registry = app::build_registry(config)?;
    let workflow_type = args
        .workflow
        .unwrap_or_else(|| config.default_workflow.clone());
    let out = list_tasks(&registry, &workflow_type)?;
    output(&out, json_mode);
    Ok(())
}

fn list_tasks(registry: &TaskRegistry, workflow_type: &str) -> Result<TasksOutput> {
    let wf = registry.get(workflow_type)?;
    Ok(TasksOutput {
        workflow_type: wf.name.clone(),
        description: wf.description.clone(),
        tasks: wf
            .tasks
            .iter()
            .map(|t| TaskRow {
                name: t.name.clone(),
                priority: t.priority.to_string(),
                dependencies: t.dependencies.iter().cloned().collect(),
                timeout_secs: t.timeout_secs,
            })
            .collect(),
        available_types: registry.workflow_types().map(|w| w.name.clone()).collect(),
    })
}
