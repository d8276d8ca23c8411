//! Implementation of the `conductor run` command.

use anyhow::{anyhow, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::app;
use crate::cli::output::{colorize_status, label, output, table, truncate, CommandOutput};
use crate::domain::models::{
    Config, ExecutionMode, TaskStatus, WorkflowAction, WorkflowStatus, WorkflowSummary,
};
use crate::services::{MonitorReport, OrchestrateRequest, Orchestrator, WorkflowHandle};

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Execution mode: sequential, parallel or intelligent
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<ExecutionMode>,

    /// Workflow type (defaults to the configured default)
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Run only these tasks (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tasks: Vec<String>,

    /// Keep state in memory instead of the project database
    #[arg(long)]
    pub ephemeral: bool,
}

pub fn parse_mode(s: &str) -> Result<ExecutionMode, String> {
    ExecutionMode::from_str(s)
        .ok_or_else(|| format!("unknown mode '{s}' (expected sequential, parallel or intelligent)"))
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub summary: WorkflowSummary,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!("{} {}", label("Workflow"), s.workflow_id),
            format!("{} {} ({})", label("Type"), s.workflow_type, s.mode),
            format!("{} {}", label("Status"), colorize_status(s.status.as_str())),
            format!("{} {}ms", label("Duration"), s.duration_ms),
        ];
        if let Some(error) = &s.error {
            lines.push(format!("{} {}", label("Error"), error));
        }

        let mut t = table(["Phase", "Task", "Result"]);
        for (index, phase) in s.phases.iter().enumerate() {
            for task in phase {
                let result = if s.succeeded.contains(task) {
                    "completed".to_string()
                } else if let Some(err) = s.errors.get(task) {
                    format!("failed: {}", truncate(err, 60))
                } else if s.skipped.contains(task) {
                    "skipped".to_string()
                } else {
                    "not dispatched".to_string()
                };
                t.add_row(vec![(index + 1).to_string(), task.clone(), result]);
            }
        }
        if !s.phases.is_empty() {
            lines.push(String::new());
            lines.push(t.to_string());
        }

        for warning in &s.warnings {
            lines.push(format!("warning: {warning}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let orchestrator = app::build_orchestrator(config, args.ephemeral).await?;

    let mut request = OrchestrateRequest::new();
    if let Some(mode) = args.mode {
        request = request.with_mode(mode);
    }
    if let Some(workflow) = args.workflow {
        request = request.with_workflow_type(workflow);
    }
    if !args.tasks.is_empty() {
        request = request.with_tasks(args.tasks);
    }

    let handle = orchestrator.start(request).await?;
    let show_progress = !json_mode && console::Term::stderr().is_term();
    let summary = drive(&orchestrator, handle, show_progress).await;

    let failed = summary.status == WorkflowStatus::Failed;
    let error = summary.error.clone();
    let id = summary.workflow_id;
    output(&RunOutput { summary }, json_mode);

    if failed {
        return Err(anyhow!(
            "workflow {id} failed{}",
            error.map(|e| format!(": {e}")).unwrap_or_default()
        ));
    }
    Ok(())
}

/// Follow a run until it finishes, aborting it on Ctrl-C.
async fn drive(orchestrator: &Orchestrator, handle: WorkflowHandle, show_progress: bool) -> WorkflowSummary {
    let spinner = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let id = handle.id();
    let mut aborting = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !handle.status().await.is_terminal() {
        tokio::select! {
            () = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = &mut ctrl_c, if !aborting => {
                aborting = true;
                if let Err(e) = orchestrator.manage_workflow(WorkflowAction::Abort, Some(id)).await {
                    tracing::warn!(workflow_id = %id, error = %e, "abort request rejected");
                }
            }
        }

        if let Some(pb) = &spinner {
            if let Ok(report) = orchestrator.monitor(Some(id), None).await {
                pb.set_message(progress_message(&report));
            }
        }
    }

    let summary = handle.wait().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    summary
}

fn progress_message(report: &MonitorReport) -> String {
    match report {
        MonitorReport::Workflow {
            snapshot,
            current_phase,
        } => {
            let settled = snapshot
                .task_states
                .iter()
                .filter(|t| t.status.is_terminal())
                .count();
            let running = snapshot.tasks_with_status(TaskStatus::Running);
            format!(
                "phase {}/{} | {}/{} tasks settled | running: {}",
                current_phase.unwrap_or(snapshot.completed_phases),
                snapshot.plan.phase_count(),
                settled,
                snapshot.task_states.len(),
                if running.is_empty() {
                    "-".to_string()
                } else {
                    running.join(", ")
                }
            )
        }
        MonitorReport::Task { state, .. } => format!("{}: {}", state.task_name, state.status),
    }
}
