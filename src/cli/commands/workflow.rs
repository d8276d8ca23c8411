//! Implementation of the `conductor workflow` commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::app;
use crate::cli::output::{colorize_status, label, output, table, truncate, CommandOutput};
use crate::domain::models::{Config, Workflow, WorkflowSnapshot};
use crate::services::{MonitorReport, Orchestrator};

#[derive(Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// List recently updated workflows
    List {
        /// Maximum number of workflows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show a workflow's task states (latest workflow if no id is given)
    Show {
        /// Workflow ID
        id: Option<Uuid>,

        /// Show a single task
        #[arg(short, long)]
        task: Option<String>,
    },
}

// ── Output structs ──────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
pub struct WorkflowListOutput {
    workflows: Vec<Workflow>,
}

impl CommandOutput for WorkflowListOutput {
    fn to_human(&self) -> String {
        if self.workflows.is_empty() {
            return "No workflows recorded.".to_string();
        }

        let mut t = table(["ID", "Type", "Mode", "Status", "Tasks", "Created"]);
        for wf in &self.workflows {
            t.add_row(vec![
                wf.id.to_string(),
                wf.workflow_type.clone(),
                wf.mode.to_string(),
                colorize_status(wf.status.as_str()).to_string(),
                wf.task_set.len().to_string(),
                wf.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }
        t.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WorkflowShowOutput {
    report: MonitorReport,
}

impl CommandOutput for WorkflowShowOutput {
    fn to_human(&self) -> String {
        match &self.report {
            MonitorReport::Task { workflow_id, state } => {
                let mut lines = vec![
                    format!("{} {}", label("Workflow"), workflow_id),
                    format!("{} {}", label("Task"), state.task_name),
                    format!("{} {}", label("Status"), colorize_status(state.status.as_str())),
                    format!("{} {}", label("Attempts"), state.attempts),
                ];
                if let Some(ms) = state.duration_ms() {
                    lines.push(format!("{} {ms}ms", label("Duration")));
                }
                if let Some(error) = &state.error {
                    lines.push(format!("{} {error}", label("Error")));
                }
                if let Some(out) = &state.output {
                    lines.push(format!("{} {out}", label("Output")));
                }
                lines.join("\n")
            }
            MonitorReport::Workflow {
                snapshot,
                current_phase,
            } => render_snapshot(snapshot, *current_phase),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn render_snapshot(snapshot: &WorkflowSnapshot, current_phase: Option<usize>) -> String {
    let wf = &snapshot.workflow;
    let mut lines = vec![
        format!("{} {}", label("Workflow"), wf.id),
        format!("{} {} ({})", label("Type"), wf.workflow_type, wf.mode),
        format!("{} {}", label("Status"), colorize_status(wf.status.as_str())),
        format!(
            "{} {}/{} complete",
            label("Phases"),
            snapshot.completed_phases,
            snapshot.plan.phase_count()
        ),
    ];
    if let Some(phase) = current_phase {
        lines.push(format!("{} {phase}", label("Current phase")));
    }
    if let Some(error) = &wf.error {
        lines.push(format!("{} {error}", label("Error")));
    }

    let mut t = table(["Phase", "Task", "Status", "Duration", "Error"]);
    for state in &snapshot.task_states {
        t.add_row(vec![
            snapshot
                .plan
                .phase_of(&state.task_name)
                .map_or_else(|| "-".to_string(), |p| (p + 1).to_string()),
            state.task_name.clone(),
            colorize_status(state.status.as_str()).to_string(),
            state
                .duration_ms()
                .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms")),
            state
                .error
                .as_deref()
                .map_or_else(|| "-".to_string(), |e| truncate(e, 50)),
        ]);
    }
    lines.push(t.to_string());

    for warning in &wf.warnings {
        lines.push(format!("warning: {warning}"));
    }
    lines.join("\n")
}

// ── Command execution ───────────────────────────────────────────────────

pub async fn execute(args: WorkflowArgs, config: &Config, json_mode: bool) -> Result<()> {
    let orchestrator = app::build_orchestrator(config, false).await?;
    match args.command {
        WorkflowCommands::List { limit } => list_workflows(&orchestrator, limit, json_mode).await,
        WorkflowCommands::Show { id, task } => {
            show_workflow(&orchestrator, id, task.as_deref(), json_mode).await
        }
    }
}

async fn list_workflows(orchestrator: &Orchestrator, limit: usize, json_mode: bool) -> Result<()> {
    let workflows = orchestrator.recent_workflows(limit).await?;
    output(&WorkflowListOutput { workflows }, json_mode);
    Ok(())
}

async fn show_workflow(
    orchestrator: &Orchestrator,
    id: Option<Uuid>,
    task: Option<&str>,
    json_mode: bool,
) -> Result<()> {
    let report = orchestrator.monitor(id, task).await?;
    output(&WorkflowShowOutput { report }, json_mode);
    Ok(())
}
