//! Workflow domain model.
//!
//! A workflow is one orchestrated run over a subset of a workflow type's
//! tasks under a chosen execution mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::plan::ExecutionPlan;
use super::task::{TaskState, TaskStatus};
use crate::domain::errors::{DomainResult, OrchestrationError};

// ============================================================================
// Execution Mode
// ============================================================================

/// How tasks within the resolved phases are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One task at a time, in phase order.
    Sequential,
    /// Every task of a phase at once, no concurrency cap.
    Parallel,
    /// Fan-out within a phase bounded by the engine's concurrency limit,
    /// higher priorities admitted first.
    Intelligent,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Intelligent
    }
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Intelligent => "intelligent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "intelligent" => Some(Self::Intelligent),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Workflow Status
// ============================================================================

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but not yet started.
    Pending,
    /// Currently executing phases.
    Running,
    /// Every phase ran. Non-critical task failures may be present.
    Completed,
    /// Resolution failed or a critical task failed.
    Failed,
    /// Held at a phase boundary.
    Paused,
    /// Stopped on request before all phases ran.
    Aborted,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Aborted => "aborted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "paused" => Some(Self::Paused),
            "aborted" | "canceled" | "cancelled" => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    pub fn valid_transitions(&self) -> Vec<WorkflowStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Failed, Self::Aborted],
            Self::Running => vec![Self::Paused, Self::Completed, Self::Failed, Self::Aborted],
            Self::Paused => vec![Self::Running, Self::Aborted],
            Self::Completed | Self::Failed | Self::Aborted => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// A single orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub workflow_type: String,
    pub mode: ExecutionMode,
    /// Requested task names, sorted.
    pub task_set: Vec<String>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Why the workflow failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal problems seen during the run (persistence, delivery).
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Workflow {
    pub fn new(workflow_type: impl Into<String>, mode: ExecutionMode, mut task_set: Vec<String>) -> Self {
        task_set.sort();
        task_set.dedup();
        Self {
            id: Uuid::new_v4(),
            workflow_type: workflow_type.into(),
            mode,
            task_set,
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn transition_to(&mut self, status: WorkflowStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(status) {
            return Err(OrchestrationError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        if status == WorkflowStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        self.status = status;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> DomainResult<()> {
        self.transition_to(WorkflowStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn duration_ms(&self) -> i64 {
        let start = self.started_at.unwrap_or(self.created_at);
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - start).num_milliseconds().max(0)
    }
}

/// Control actions accepted by `manage_workflow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Pause,
    Resume,
    Abort,
    Status,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshot & Summary
// ============================================================================

/// Persisted record of a workflow's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow: Workflow,
    pub plan: ExecutionPlan,
    /// Number of phases that have fully settled.
    pub completed_phases: usize,
    pub task_states: Vec<TaskState>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    pub fn new(workflow: Workflow, plan: ExecutionPlan, completed_phases: usize, task_states: Vec<TaskState>) -> Self {
        Self {
            workflow,
            plan,
            completed_phases,
            task_states,
            updated_at: Utc::now(),
        }
    }

    pub fn task_state(&self, name: &str) -> Option<&TaskState> {
        self.task_states.iter().find(|s| s.task_name == name)
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<String> {
        self.task_states
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.task_name.clone())
            .collect()
    }
}

/// Final result returned by `orchestrate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: Uuid,
    pub workflow_type: String,
    pub mode: ExecutionMode,
    pub status: WorkflowStatus,
    pub phases: Vec<Vec<String>>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Failed and skipped tasks mapped to their error message.
    pub errors: BTreeMap<String, String>,
    pub skipped: Vec<String>,
    /// Tasks never dispatched because the run stopped early.
    pub not_dispatched: Vec<String>,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl WorkflowSummary {
    pub fn from_snapshot(snapshot: &WorkflowSnapshot) -> Self {
        let mut errors = BTreeMap::new();
        for state in &snapshot.task_states {
            if let Some(err) = &state.error {
                errors.insert(state.task_name.clone(), err.clone());
            }
        }

        let workflow = &snapshot.workflow;
        let mut not_dispatched = Vec::new();
        if workflow.status.is_terminal() {
            not_dispatched = snapshot.tasks_with_status(TaskStatus::Pending);
        }

        Self {
            workflow_id: workflow.id,
            workflow_type: workflow.workflow_type.clone(),
            mode: workflow.mode,
            status: workflow.status,
            phases: snapshot.plan.phases().to_vec(),
            succeeded: snapshot.tasks_with_status(TaskStatus::Completed),
            failed: snapshot.tasks_with_status(TaskStatus::Failed),
            errors,
            skipped: snapshot.tasks_with_status(TaskStatus::Skipped),
            not_dispatched,
            duration_ms: workflow.duration_ms(),
            error: workflow.error.clone(),
            warnings: workflow.warnings.clone(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || self.status == WorkflowStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_task_set_sorted_and_deduped() {
        let wf = Workflow::new(
            "content",
            ExecutionMode::Intelligent,
            vec!["b".into(), "a".into(), "b".into()],
        );
        assert_eq!(wf.task_set, vec!["a", "b"]);
        assert_eq!(wf.status, WorkflowStatus::Pending);
    }

    #[test]
    fn test_workflow_transitions() {
        let mut wf = Workflow::new("content", ExecutionMode::Sequential, vec![]);
        wf.transition_to(WorkflowStatus::Running).unwrap();
        assert!(wf.started_at.is_some());
        wf.transition_to(WorkflowStatus::Paused).unwrap();
        wf.transition_to(WorkflowStatus::Running).unwrap();
        wf.transition_to(WorkflowStatus::Completed).unwrap();
        assert!(wf.ended_at.is_some());
        assert!(wf.transition_to(WorkflowStatus::Running).is_err());
    }

    #[test]
    fn test_paused_cannot_complete_directly() {
        let mut wf = Workflow::new("content", ExecutionMode::Parallel, vec![]);
        wf.transition_to(WorkflowStatus::Running).unwrap();
        wf.transition_to(WorkflowStatus::Paused).unwrap();
        assert!(!wf.status.can_transition_to(WorkflowStatus::Completed));
        wf.transition_to(WorkflowStatus::Aborted).unwrap();
        assert!(wf.status.is_terminal());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ExecutionMode::from_str("Parallel"), Some(ExecutionMode::Parallel));
        assert_eq!(ExecutionMode::from_str("random"), None);
        assert_eq!(ExecutionMode::default(), ExecutionMode::Intelligent);
    }

    #[test]
    fn test_summary_enumerates_every_outcome() {
        let mut wf = Workflow::new("content", ExecutionMode::Intelligent, vec!["y".into(), "z".into(), "w".into()]);
        wf.transition_to(WorkflowStatus::Running).unwrap();
        wf.transition_to(WorkflowStatus::Completed).unwrap();

        let mut y = TaskState::new("y");
        y.start().unwrap();
        y.fail("bad output").unwrap();
        let mut z = TaskState::new("z");
        z.start().unwrap();
        z.complete(serde_json::Value::Null).unwrap();
        let w = TaskState::new("w");

        let plan = ExecutionPlan::new(vec![vec!["y".into(), "z".into()], vec!["w".into()]]);
        let snapshot = WorkflowSnapshot::new(wf, plan, 1, vec![y, z, w]);
        let summary = WorkflowSummary::from_snapshot(&snapshot);

        assert_eq!(summary.succeeded, vec!["z"]);
        assert_eq!(summary.failed, vec!["y"]);
        assert_eq!(summary.errors.get("y").map(String::as_str), Some("bad output"));
        assert_eq!(summary.not_dispatched, vec!["w"]);
        assert!(summary.has_failures());
    }
}
