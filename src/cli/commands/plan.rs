//! Implementation of the `conductor plan` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::app;
use crate::cli::output::{colorize_priority, output, table, CommandOutput};
use crate::domain::models::{Config, ExecutionPlan, TaskRegistry};
use crate::services::DependencyResolver;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Workflow type (defaults to the configured default)
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Plan only these tasks (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tasks: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
struct PlannedTask {
    name: String,
    priority: String,
    dependencies: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    workflow_type: String,
    phases: Vec<Vec<PlannedTask>>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut t = table(["Phase", "Task", "Priority", "Depends on"]);
        for (index, phase) in self.phases.iter().enumerate() {
            for task in phase {
                t.add_row(vec![
                    (index + 1).to_string(),
                    task.name.clone(),
                    colorize_priority(&task.priority).to_string(),
                    if task.dependencies.is_empty() {
                        "-".to_string()
                    } else {
                        task.dependencies.join(", ")
                    },
                ]);
            }
        }
        format!(
            "Plan for '{}' ({} phases)\n{}",
            self.workflow_type,
            self.phases.len(),
            t
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: PlanArgs, config: &Config, json_mode: bool) -> Result<()> {
    let registry = app::build_registry(config)?;
    let workflow_type = args
        .workflow
        .unwrap_or_else(|| config.default_workflow.clone());
    let subset = (!args.tasks.is_empty()).then_some(args.tasks);

    let out = build_plan(&registry, &workflow_type, subset.as_deref())?;
    output(&out, json_mode);
    Ok(())
}

fn build_plan(registry: &TaskRegistry, workflow_type: &str, subset: Option<&[String]>) -> Result<PlanOutput> {
    let definitions = registry.select(workflow_type, subset)?;
    let plan: ExecutionPlan = DependencyResolver::new()
        .resolve(&definitions)
        .with_context(|| format!("Cannot plan workflow '{workflow_type}'"))?;

    let phases = plan
        .phases()
        .iter()
        .map(|phase| {
            phase
                .iter()
                .filter_map(|name| definitions.iter().find(|d| &d.name == name))
                .map(|d| PlannedTask {
                    name: d.name.clone(),
                    priority: d.priority.to_string(),
                    dependencies: d.dependencies.iter().cloned().collect(),
                })
                .collect()
        })
        .collect();

    Ok(PlanOutput {
        workflow_type: workflow_type.to_string(),
        phases,
    })
}
