//! Orchestration API: start, monitor, message and control workflows.
//!
//! An `Orchestrator` owns everything a run needs. It keeps no process-wide
//! state; runs started by one instance are invisible to another except
//! through the workflow store.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    ExecutionMode, ExecutionPlan, Message, MessageType, Priority, TaskRegistry, TaskState, Workflow,
    WorkflowAction, WorkflowSnapshot, WorkflowStatus, WorkflowSummary, CONTENT_WORKFLOW,
};
use crate::domain::ports::WorkflowStore;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::execution_engine::{ControlHandle, ExecutionEngine, RunState};
use crate::services::message_bus::MessageBus;

/// Parameters of `orchestrate`. Unset fields fall back to the
/// orchestrator's defaults; no task subset means every task of the type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrateRequest {
    pub mode: Option<ExecutionMode>,
    pub tasks: Option<Vec<String>>,
    pub workflow_type: Option<String>,
}

impl OrchestrateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks = Some(tasks.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_workflow_type(mut self, workflow_type: impl Into<String>) -> Self {
        self.workflow_type = Some(workflow_type.into());
        self
    }
}

/// Answer to `monitor`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorReport {
    Task {
        workflow_id: Uuid,
        state: TaskState,
    },
    Workflow {
        snapshot: WorkflowSnapshot,
        /// 1-based phase in progress, while the workflow is live.
        current_phase: Option<usize>,
    },
}

/// A started workflow.
pub struct WorkflowHandle {
    state: RunState,
    join: JoinHandle<()>,
}

impl WorkflowHandle {
    pub fn id(&self) -> Uuid {
        self.state.id()
    }

    pub async fn status(&self) -> WorkflowStatus {
        self.state.status().await
    }

    /// Wait for the workflow to finish and summarize it.
    pub async fn wait(self) -> WorkflowSummary {
        if let Err(e) = self.join.await {
            warn!(workflow_id = %self.state.id(), error = %e, "workflow driver did not finish cleanly");
        }
        WorkflowSummary::from_snapshot(&self.state.snapshot().await)
    }
}

struct ActiveRun {
    state: RunState,
    control: ControlHandle,
}

pub struct Orchestrator {
    registry: TaskRegistry,
    resolver: DependencyResolver,
    engine: Arc<ExecutionEngine>,
    store: Arc<dyn WorkflowStore>,
    bus: MessageBus,
    default_workflow: String,
    default_mode: ExecutionMode,
    runs: RwLock<HashMap<Uuid, ActiveRun>>,
    latest: RwLock<Option<Uuid>>,
}

impl Orchestrator {
    /// `bus` must be the same bus the engine was built with.
    pub fn new(
        registry: TaskRegistry,
        engine: ExecutionEngine,
        store: Arc<dyn WorkflowStore>,
        bus: MessageBus,
    ) -> Self {
        Self {
            registry,
            resolver: DependencyResolver::new(),
            engine: Arc::new(engine),
            store,
            bus,
            default_workflow: CONTENT_WORKFLOW.to_string(),
            default_mode: ExecutionMode::default(),
            runs: RwLock::new(HashMap::new()),
            latest: RwLock::new(None),
        }
    }

    pub fn with_default_workflow(mut self, workflow_type: impl Into<String>) -> Self {
        self.default_workflow = workflow_type.into();
        self
    }

    pub fn with_default_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn default_workflow(&self) -> &str {
        &self.default_workflow
    }

    /// Resolve phases without running anything.
    pub fn plan(&self, workflow_type: Option<&str>, tasks: Option<&[String]>) -> DomainResult<ExecutionPlan> {
        let workflow_type = workflow_type.unwrap_or(&self.default_workflow);
        let definitions = self.registry.select(workflow_type, tasks)?;
        self.resolver.resolve(&definitions)
    }

    /// Run a workflow to completion.
    pub async fn orchestrate(&self, request: OrchestrateRequest) -> DomainResult<WorkflowSummary> {
        let handle = self.start(request).await?;
        Ok(handle.wait().await)
    }

    /// Create a workflow and start driving it in the background.
    ///
    /// Unknown workflow types and task names are rejected before anything
    /// is created. A cycle or a dependency outside the requested subset
    /// creates the workflow and fails it immediately.
    #[instrument(skip(self))]
    pub async fn start(&self, request: OrchestrateRequest) -> DomainResult<WorkflowHandle> {
        let workflow_type = request
            .workflow_type
            .unwrap_or_else(|| self.default_workflow.clone());
        let mode = request.mode.unwrap_or(self.default_mode);

        let definitions = self
            .registry
            .select(&workflow_type, request.tasks.as_deref())?;
        let names = definitions.iter().map(|d| d.name.clone()).collect();
        let mut workflow = Workflow::new(workflow_type, mode, names);

        let (control, rx) = ControlHandle::channel();

        match self.resolver.resolve(&definitions) {
            Ok(plan) => {
                info!(workflow_id = %workflow.id, plan = %plan, "execution plan resolved");
                // Running from here on, so control actions apply immediately.
                workflow.transition_to(WorkflowStatus::Running)?;
                let state = RunState::new(workflow, plan);
                self.register(&state, control).await;

                let engine = self.engine.clone();
                let driver_state = state.clone();
                let join = tokio::spawn(async move {
                    engine.run(&driver_state, &definitions, rx).await;
                });
                Ok(WorkflowHandle { state, join })
            }
            Err(e) if e.is_workflow_fatal() => {
                warn!(workflow_id = %workflow.id, error = %e, "workflow rejected during resolution");
                let state = RunState::new(workflow, ExecutionPlan::default());
                state
                    .update_workflow(|wf| wf.fail(e.to_string()))
                    .await?;
                self.engine.persist(&state).await;
                self.register(&state, control).await;
                Ok(WorkflowHandle {
                    state,
                    join: tokio::spawn(async {}),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn register(&self, state: &RunState, control: ControlHandle) {
        let mut runs = self.runs.write().await;

        // Finished runs stay reachable through the store.
        let mut finished = Vec::new();
        for (id, run) in runs.iter() {
            if run.state.status().await.is_terminal() {
                finished.push(*id);
            }
        }
        for id in finished {
            runs.remove(&id);
        }

        runs.insert(
            state.id(),
            ActiveRun {
                state: state.clone(),
                control,
            },
        );
        *self.latest.write().await = Some(state.id());
    }

    /// The given workflow id, or the most recent workflow.
    async fn target(&self, workflow_id: Option<Uuid>) -> DomainResult<Uuid> {
        if let Some(id) = workflow_id {
            return Ok(id);
        }
        if let Some(id) = *self.latest.read().await {
            return Ok(id);
        }
        self.store
            .list_recent(1)
            .await?
            .into_iter()
            .next()
            .map(|wf| wf.id)
            .ok_or(OrchestrationError::NoWorkflow)
    }

    async fn active(&self, id: Uuid) -> Option<(RunState, ControlHandle)> {
        self.runs
            .read()
            .await
            .get(&id)
            .map(|run| (run.state.clone(), run.control.clone()))
    }

    async fn snapshot_of(&self, id: Uuid) -> DomainResult<WorkflowSnapshot> {
        match self.active(id).await {
            Some((state, _)) => Ok(state.snapshot().await),
            None => self.store.load(id).await,
        }
    }

    /// Status of one task, or of a whole workflow.
    pub async fn monitor(&self, workflow_id: Option<Uuid>, task: Option<&str>) -> DomainResult<MonitorReport> {
        let id = self.target(workflow_id).await?;
        let snapshot = self.snapshot_of(id).await?;

        if let Some(task) = task {
            let state = snapshot
                .task_state(task)
                .cloned()
                .ok_or_else(|| OrchestrationError::UnknownTask(task.to_string()))?;
            return Ok(MonitorReport::Task {
                workflow_id: id,
                state,
            });
        }

        let live = matches!(
            snapshot.workflow.status,
            WorkflowStatus::Running | WorkflowStatus::Paused
        );
        let current_phase = (live && snapshot.completed_phases < snapshot.plan.phase_count())
            .then_some(snapshot.completed_phases + 1);
        Ok(MonitorReport::Workflow {
            snapshot,
            current_phase,
        })
    }

    /// Put a message on the bus for `to_task` in a workflow.
    pub async fn communicate(
        &self,
        workflow_id: Option<Uuid>,
        from_task: &str,
        to_task: &str,
        message_type: MessageType,
        payload: serde_json::Value,
        priority: Option<Priority>,
    ) -> DomainResult<Uuid> {
        let id = self.target(workflow_id).await?;
        if self.active(id).await.is_none() {
            // Only to confirm the workflow exists.
            self.store.load(id).await?;
        }
        self.bus
            .communicate(id, from_task, to_task, message_type, payload, priority)
            .await
    }

    /// Every message of a workflow.
    pub async fn messages(&self, workflow_id: Option<Uuid>) -> DomainResult<Vec<Message>> {
        let id = self.target(workflow_id).await?;
        self.bus.history(id).await
    }

    pub async fn recent_workflows(&self, limit: usize) -> DomainResult<Vec<Workflow>> {
        self.store.list_recent(limit).await
    }

    /// Pause, resume, abort or query a workflow. Returns its status after
    /// the action.
    #[instrument(skip(self))]
    pub async fn manage_workflow(&self, action: WorkflowAction, workflow_id: Option<Uuid>) -> DomainResult<WorkflowStatus> {
        let id = self.target(workflow_id).await?;

        let Some((state, control)) = self.active(id).await else {
            let stored = self.store.load(id).await?;
            let status = stored.workflow.status;
            return match action {
                WorkflowAction::Status => Ok(status),
                _ => Err(invalid_action(action, status)),
            };
        };

        let target = match action {
            WorkflowAction::Status => return Ok(state.status().await),
            WorkflowAction::Pause => WorkflowStatus::Paused,
            WorkflowAction::Resume => WorkflowStatus::Running,
            WorkflowAction::Abort => WorkflowStatus::Aborted,
        };

        let status = state
            .update_workflow(|wf| {
                if !wf.status.can_transition_to(target) {
                    return Err(invalid_action(action, wf.status));
                }
                wf.transition_to(target)?;
                Ok(wf.status)
            })
            .await?;

        match action {
            WorkflowAction::Pause => control.pause(),
            WorkflowAction::Resume => control.resume(),
            WorkflowAction::Abort => control.abort(),
            WorkflowAction::Status => false,
        };
        info!(workflow_id = %id, %action, %status, "workflow control applied");

        self.engine.persist(&state).await;
        Ok(status)
    }
}

fn invalid_action(action: WorkflowAction, status: WorkflowStatus) -> OrchestrationError {
    OrchestrationError::InvalidAction {
        action: action.to_string(),
        status: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executors::{ScriptedExecutor, ScriptedResponse};
    use crate::adapters::memory::{InMemoryMessageLog, InMemoryWorkflowStore};
    use crate::domain::models::{TaskDefinition, WorkflowType};
    use crate::services::execution_engine::ExecutorConfig;
    use std::time::Duration;

    fn orchestrator(executor: ScriptedExecutor) -> Orchestrator {
        let mut registry = TaskRegistry::builtin();
        registry
            .register(
                WorkflowType::new("demo", "four tasks")
                    .with_task(TaskDefinition::new("a"))
                    .with_task(TaskDefinition::new("b"))
                    .with_task(TaskDefinition::new("c").with_dependencies(["a", "b"]))
                    .with_task(TaskDefinition::new("d").with_dependencies(["c"])),
            )
            .unwrap();

        let store: Arc<dyn WorkflowStore> = Arc::new(InMemoryWorkflowStore::new());
        let bus = MessageBus::new(Arc::new(InMemoryMessageLog::new()));
        let engine = ExecutionEngine::new(
            Arc::new(executor),
            bus.clone(),
            store.clone(),
            ExecutorConfig::default(),
        );
        Orchestrator::new(registry, engine, store, bus).with_default_workflow("demo")
    }

    #[tokio::test]
    async fn test_orchestrate_defaults() {
        let orch = orchestrator(ScriptedExecutor::new());
        let summary = orch.orchestrate(OrchestrateRequest::new()).await.unwrap();

        assert_eq!(summary.workflow_type, "demo");
        assert_eq!(summary.mode, ExecutionMode::Intelligent);
        assert_eq!(summary.status, WorkflowStatus::Completed);
        assert_eq!(summary.succeeded, vec!["a", "b", "c", "d"]);
        assert!(!summary.has_failures());
    }

    #[tokio::test]
    async fn test_unknown_inputs_are_rejected_up_front() {
        let orch = orchestrator(ScriptedExecutor::new());

        let err = orch
            .orchestrate(OrchestrateRequest::new().with_workflow_type("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, OrchestrationError::UnknownWorkflowType("nope".to_string()));

        let err = orch
            .orchestrate(OrchestrateRequest::new().with_tasks(["zzz"]))
            .await
            .unwrap_err();
        assert_eq!(err, OrchestrationError::UnknownTask("zzz".to_string()));

        assert_eq!(
            orch.monitor(None, None).await.unwrap_err(),
            OrchestrationError::NoWorkflow
        );
    }

    #[tokio::test]
    async fn test_subset_with_outside_dependency_fails_workflow() {
        let orch = orchestrator(ScriptedExecutor::new());
        let summary = orch
            .orchestrate(OrchestrateRequest::new().with_tasks(["c"]))
            .await
            .unwrap();

        assert_eq!(summary.status, WorkflowStatus::Failed);
        assert!(summary.error.unwrap().contains("depends on"));
        assert_eq!(summary.not_dispatched, vec!["c"]);

        let status = orch
            .manage_workflow(WorkflowAction::Status, Some(summary.workflow_id))
            .await
            .unwrap();
        assert_eq!(status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_monitor_task_and_workflow() {
        let orch = orchestrator(ScriptedExecutor::new());
        let summary = orch.orchestrate(OrchestrateRequest::new()).await.unwrap();

        match orch.monitor(None, Some("c")).await.unwrap() {
            MonitorReport::Task { workflow_id, state } => {
                assert_eq!(workflow_id, summary.workflow_id);
                assert_eq!(state.status, crate::domain::models::TaskStatus::Completed);
                assert_eq!(state.attempts, 1);
            }
            other => panic!("expected task report, got {other:?}"),
        }

        match orch.monitor(Some(summary.workflow_id), None).await.unwrap() {
            MonitorReport::Workflow {
                snapshot,
                current_phase,
            } => {
                assert_eq!(snapshot.completed_phases, 3);
                assert_eq!(current_phase, None);
            }
            other => panic!("expected workflow report, got {other:?}"),
        }

        assert!(matches!(
            orch.monitor(None, Some("ghost")).await,
            Err(OrchestrationError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_resume_and_invalid_actions() {
        let executor = ScriptedExecutor::new()
            .with_response("a", ScriptedResponse::default().with_delay(Duration::from_millis(60)));
        let orch = orchestrator(executor);
        let handle = orch.start(OrchestrateRequest::new()).await.unwrap();
        let id = handle.id();

        assert_eq!(
            orch.manage_workflow(WorkflowAction::Pause, None).await.unwrap(),
            WorkflowStatus::Paused
        );
        assert!(matches!(
            orch.manage_workflow(WorkflowAction::Pause, Some(id)).await,
            Err(OrchestrationError::InvalidAction { .. })
        ));

        tokio::time::sleep(Duration::from_millis(150)).await;
        match orch.monitor(Some(id), Some("c")).await.unwrap() {
            MonitorReport::Task { state, .. } => {
                assert_eq!(state.status, crate::domain::models::TaskStatus::Pending)
            }
            other => panic!("unexpected report {other:?}"),
        }

        assert_eq!(
            orch.manage_workflow(WorkflowAction::Resume, Some(id)).await.unwrap(),
            WorkflowStatus::Running
        );
        let summary = handle.wait().await;
        assert_eq!(summary.status, WorkflowStatus::Completed);

        assert!(matches!(
            orch.manage_workflow(WorkflowAction::Abort, Some(id)).await,
            Err(OrchestrationError::InvalidAction { .. })
        ));
    }

    #[tokio::test]
    async fn test_communicate_requires_known_workflow() {
        let orch = orchestrator(ScriptedExecutor::new());
        let missing = Uuid::new_v4();
        let err = orch
            .communicate(
                Some(missing),
                "a",
                "b",
                MessageType::DataRequest,
                serde_json::Value::Null,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err, OrchestrationError::WorkflowNotFound(missing));

        let summary = orch.orchestrate(OrchestrateRequest::new()).await.unwrap();
        orch.communicate(
            None,
            "d",
            "a",
            MessageType::ValidationFeedback,
            serde_json::json!({"retry": false}),
            Some(Priority::Low),
        )
        .await
        .unwrap();

        let messages = orch.messages(Some(summary.workflow_id)).await.unwrap();
        assert!(messages
            .iter()
            .any(|m| m.from_task == "d" && m.priority == Priority::Low));
    }
}
