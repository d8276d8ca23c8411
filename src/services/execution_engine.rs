//! Execution engine for phase-based task dispatch.
//!
//! Phases are strict barriers: every task of phase k settles before any
//! task of phase k+1 is dispatched. The mode decides how a phase is
//! dispatched:
//!
//! - `sequential`: one task at a time, in phase order.
//! - `parallel`: every task of the phase at once.
//! - `intelligent`: the whole phase concurrently, capped at
//!   `max_concurrency`, higher priorities admitted first.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::OrchestrationError;
use crate::domain::models::{
    DependentFailurePolicy, EngineConfig, ExecutionMode, ExecutionPlan, Message, MessageType,
    Priority, TaskDefinition, TaskStatus, Workflow, WorkflowSnapshot, WorkflowStatus,
};
use crate::domain::ports::{EventNotifier, TaskEvent, TaskExecutor, WorkflowContext, WorkflowStore};
use crate::services::event_notifier::NotifierHandle;
use crate::services::message_bus::MessageBus;
use crate::services::task_state_tracker::TaskStateTracker;

/// Configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum concurrent tasks per phase in intelligent mode.
    pub max_concurrency: usize,
    /// Deadline for a single task invocation, unless the task sets its own.
    pub task_timeout: Duration,
    /// What happens to dependents of a failed task.
    pub dependent_failure_policy: DependentFailurePolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            task_timeout: Duration::from_secs(300),
            dependent_failure_policy: DependentFailurePolicy::Proceed,
        }
    }
}

impl From<&EngineConfig> for ExecutorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            dependent_failure_policy: config.dependent_failure_policy,
        }
    }
}

// ============================================================================
// Run control
// ============================================================================

/// Control signal observed by the engine at phase boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    Running,
    Paused,
    Aborted,
}

/// Sending side of a run's control channel. Abort is final.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Arc<watch::Sender<RunControl>>,
}

impl ControlHandle {
    pub fn channel() -> (Self, watch::Receiver<RunControl>) {
        let (tx, rx) = watch::channel(RunControl::Running);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<RunControl> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> RunControl {
        *self.tx.borrow()
    }

    pub fn pause(&self) -> bool {
        self.set(RunControl::Paused)
    }

    pub fn resume(&self) -> bool {
        self.set(RunControl::Running)
    }

    pub fn abort(&self) -> bool {
        self.set(RunControl::Aborted)
    }

    fn set(&self, next: RunControl) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == RunControl::Aborted || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }
}

/// Block while paused. Returns false once the run is aborted.
async fn wait_until_runnable(control: &mut watch::Receiver<RunControl>) -> bool {
    loop {
        let current = *control.borrow_and_update();
        match current {
            RunControl::Running => return true,
            RunControl::Aborted => return false,
            RunControl::Paused => {
                debug!("run paused, waiting for resume");
                // Nobody left to resume us.
                if control.changed().await.is_err() {
                    return false;
                }
            }
        }
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Shared, per-workflow state: the workflow record, its plan and the task
/// state tracker. Cloning shares the same run.
#[derive(Debug, Clone)]
pub struct RunState {
    id: Uuid,
    workflow: Arc<RwLock<Workflow>>,
    plan: Arc<ExecutionPlan>,
    tracker: TaskStateTracker,
    completed_phases: Arc<AtomicUsize>,
}

impl RunState {
    /// Every task of the workflow starts pending, whether or not the plan
    /// could be resolved.
    pub fn new(workflow: Workflow, plan: ExecutionPlan) -> Self {
        let tracker = TaskStateTracker::new(workflow.task_set.iter().cloned());
        Self {
            id: workflow.id,
            workflow: Arc::new(RwLock::new(workflow)),
            plan: Arc::new(plan),
            tracker,
            completed_phases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn tracker(&self) -> &TaskStateTracker {
        &self.tracker
    }

    pub fn completed_phases(&self) -> usize {
        self.completed_phases.load(Ordering::SeqCst)
    }

    pub async fn workflow(&self) -> Workflow {
        self.workflow.read().await.clone()
    }

    pub async fn status(&self) -> WorkflowStatus {
        self.workflow.read().await.status
    }

    /// Mutate the workflow record under its lock.
    pub async fn update_workflow<R>(&self, f: impl FnOnce(&mut Workflow) -> R) -> R {
        let mut workflow = self.workflow.write().await;
        f(&mut workflow)
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let workflow = self.workflow().await;
        WorkflowSnapshot::new(
            workflow,
            (*self.plan).clone(),
            self.completed_phases(),
            self.tracker.snapshot().await,
        )
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of running a workflow's phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Tasks still pending when the run stopped.
    pub not_dispatched: Vec<String>,
    pub aborted: bool,
    /// Name of the critical task whose failure stopped the run.
    pub critical_failure: Option<String>,
}

#[derive(Debug, Clone)]
struct TaskReport {
    task: String,
    status: TaskStatus,
    error: Option<String>,
    priority: Priority,
}

impl TaskReport {
    fn is_critical_failure(&self) -> bool {
        self.status == TaskStatus::Failed && self.priority.is_critical()
    }
}

// ============================================================================
// Single-task runner
// ============================================================================

/// Everything a spawned task needs, cheap to clone.
#[derive(Clone)]
struct TaskRunner {
    executor: Arc<dyn TaskExecutor>,
    bus: MessageBus,
    notifier: NotifierHandle,
    tracker: TaskStateTracker,
    definitions: Arc<BTreeMap<String, TaskDefinition>>,
    dependents: Arc<BTreeMap<String, Vec<String>>>,
    workflow_id: Uuid,
    workflow_type: String,
    mode: ExecutionMode,
    default_timeout: Duration,
}

impl TaskRunner {
    fn priority_of(&self, task: &str) -> Priority {
        self.definitions
            .get(task)
            .map(|d| d.priority)
            .unwrap_or_default()
    }

    fn timeout_for(&self, task: &str) -> Duration {
        self.definitions
            .get(task)
            .and_then(|d| d.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    async fn context(&self, task: &str, attempt: u32) -> WorkflowContext {
        let inbox = match self.bus.drain(self.workflow_id, task).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(task, error = %e, "could not drain inbox");
                Vec::new()
            }
        };

        let mut upstream = BTreeMap::new();
        if let Some(def) = self.definitions.get(task) {
            for dep in &def.dependencies {
                if let Some(output) = self.tracker.output(dep).await {
                    upstream.insert(dep.clone(), output);
                }
            }
        }

        WorkflowContext {
            workflow_id: self.workflow_id,
            workflow_type: self.workflow_type.clone(),
            mode: self.mode,
            task: task.to_string(),
            priority: self.priority_of(task),
            attempt,
            inbox,
            upstream,
        }
    }

    /// Dispatch one task and record how it settled.
    async fn run(self, task: String) -> TaskReport {
        let priority = self.priority_of(&task);

        let attempt = match self.tracker.mark_running(&task).await {
            Ok(attempt) => attempt,
            Err(e) => {
                warn!(task = %task, error = %e, "task could not be started");
                let status = self.tracker.status(&task).await.unwrap_or_default();
                return TaskReport {
                    task,
                    status,
                    error: Some(e.to_string()),
                    priority,
                };
            }
        };

        let ctx = self.context(&task, attempt).await;
        self.notifier
            .emit(&task, TaskEvent::Started, &format!("attempt {attempt}"));
        info!(task = %task, attempt, inbox = ctx.inbox.len(), "task started");

        let timeout = self.timeout_for(&task);
        let start = Instant::now();
        let result = tokio::time::timeout(timeout, self.executor.execute(&task, &ctx)).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (succeeded, output, error, messages) = match result {
            Ok(Ok(outcome)) if outcome.success => (true, outcome.output, None, outcome.messages),
            Ok(Ok(outcome)) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "task reported failure".to_string());
                let err = OrchestrationError::TaskExecution {
                    task: task.clone(),
                    message,
                };
                (false, serde_json::Value::Null, Some(err.to_string()), outcome.messages)
            }
            Ok(Err(e)) => (false, serde_json::Value::Null, Some(e.to_string()), Vec::new()),
            Err(_) => {
                let err = OrchestrationError::TaskTimeout {
                    task: task.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                };
                (false, serde_json::Value::Null, Some(err.to_string()), Vec::new())
            }
        };

        let recorded = match &error {
            None => self.tracker.mark_completed(&task, output).await,
            Some(err) => self.tracker.mark_failed(&task, err.clone()).await,
        };
        if let Err(e) = recorded {
            warn!(task = %task, error = %e, "could not record task result");
        }

        match &error {
            None => {
                info!(task = %task, elapsed_ms, "task completed");
                self.notifier.emit(
                    &task,
                    TaskEvent::Completed,
                    &format!("completed in {elapsed_ms}ms"),
                );
            }
            Some(err) => {
                warn!(task = %task, elapsed_ms, error = %err, "task failed");
                self.notifier.emit(&task, TaskEvent::Failed, err);
            }
        }

        self.announce(&task, error.as_deref()).await;
        for outgoing in messages {
            self.bus
                .send_best_effort(outgoing.into_message(self.workflow_id, &task))
                .await;
        }

        TaskReport {
            task,
            status: if succeeded {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            },
            error,
            priority,
        }
    }

    /// Tell each direct dependent how `task` settled.
    async fn announce(&self, task: &str, error: Option<&str>) {
        let Some(dependents) = self.dependents.get(task) else {
            return;
        };

        for dependent in dependents {
            let (message_type, payload) = match error {
                None => (
                    MessageType::StatusUpdate,
                    serde_json::json!({ "task": task, "status": "completed" }),
                ),
                Some(err) => (
                    MessageType::ErrorReport,
                    serde_json::json!({ "task": task, "status": "failed", "error": err }),
                ),
            };
            let message = Message::new(self.workflow_id, task, dependent.as_str(), message_type, payload)
                .with_priority(self.priority_of(task));
            self.bus.send_best_effort(message).await;
        }
    }

    /// Record a task whose runner died without reporting.
    async fn record_crash(&self, task: &str, reason: String) -> TaskReport {
        if self.tracker.status(task).await == Some(TaskStatus::Pending) {
            if let Err(e) = self.tracker.mark_running(task).await {
                warn!(task, error = %e, "could not mark crashed task running");
            }
        }
        let error = format!("task runner crashed: {reason}");
        if let Err(e) = self.tracker.mark_failed(task, error.clone()).await {
            warn!(task, error = %e, "could not record crashed task");
        }
        self.notifier.emit(task, TaskEvent::Failed, &error);
        TaskReport {
            task: task.to_string(),
            status: TaskStatus::Failed,
            error: Some(error),
            priority: self.priority_of(task),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Drives a workflow's phases through a task executor.
pub struct ExecutionEngine {
    executor: Arc<dyn TaskExecutor>,
    bus: MessageBus,
    store: Arc<dyn WorkflowStore>,
    notifier: NotifierHandle,
    config: ExecutorConfig,
}

impl ExecutionEngine {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        bus: MessageBus,
        store: Arc<dyn WorkflowStore>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            executor,
            bus,
            store,
            notifier: NotifierHandle::none(),
            config,
        }
    }

    /// Attach an event notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = NotifierHandle::new(notifier);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Persist the run's snapshot. Failures become workflow warnings.
    pub async fn persist(&self, run: &RunState) {
        let snapshot = run.snapshot().await;
        if let Err(e) = self.store.snapshot(&snapshot).await {
            warn!(workflow_id = %run.id(), error = %e, "failed to persist workflow snapshot");
            run.update_workflow(|wf| wf.warn(format!("snapshot not persisted: {e}")))
                .await;
        }
    }

    /// Run every phase of `run`'s plan.
    ///
    /// `definitions` must cover every task in the plan.
    pub async fn run(
        &self,
        run: &RunState,
        definitions: &[TaskDefinition],
        mut control: watch::Receiver<RunControl>,
    ) -> EngineOutcome {
        let workflow = run.workflow().await;
        let mode = workflow.mode;
        let runner = self.runner(&workflow, definitions, run.tracker().clone());

        self.begin(run).await;
        info!(
            workflow_id = %run.id(),
            mode = %mode,
            phases = run.plan().phase_count(),
            tasks = run.plan().task_count(),
            "workflow started"
        );

        let mut aborted = false;
        let mut critical: Option<TaskReport> = None;

        for (index, phase) in run.plan().phases().iter().enumerate() {
            if !wait_until_runnable(&mut control).await {
                aborted = true;
                break;
            }

            let mut pending = Vec::with_capacity(phase.len());
            for task in phase {
                if run.tracker().status(task).await == Some(TaskStatus::Pending) {
                    pending.push(task.clone());
                }
            }
            info!(workflow_id = %run.id(), phase = index + 1, tasks = ?pending, "dispatching phase");

            let mut phase_settled = true;
            let reports = match mode {
                ExecutionMode::Sequential => {
                    let mut reports = Vec::with_capacity(pending.len());
                    for (i, task) in pending.into_iter().enumerate() {
                        if i > 0 && !wait_until_runnable(&mut control).await {
                            aborted = true;
                            phase_settled = false;
                            break;
                        }
                        let report = runner.clone().run(task).await;
                        let halt = report.is_critical_failure();
                        reports.push(report);
                        if halt {
                            break;
                        }
                    }
                    reports
                }
                ExecutionMode::Parallel | ExecutionMode::Intelligent => {
                    let limit = if mode == ExecutionMode::Intelligent {
                        pending.sort_by(|a, b| {
                            runner
                                .priority_of(b)
                                .cmp(&runner.priority_of(a))
                                .then_with(|| a.cmp(b))
                        });
                        Some(self.config.max_concurrency)
                    } else {
                        None
                    };
                    let (reports, halted) = self.fan_out(&runner, pending, limit, &control).await;
                    if halted {
                        aborted = true;
                        phase_settled = false;
                    }
                    reports
                }
            };

            if critical.is_none() {
                critical = reports.iter().find(|r| r.is_critical_failure()).cloned();
            }
            if self.config.dependent_failure_policy == DependentFailurePolicy::Skip {
                self.skip_dependents(&runner, &reports).await;
            }

            if phase_settled {
                run.completed_phases.store(index + 1, Ordering::SeqCst);
            }
            self.persist(run).await;

            let succeeded = reports
                .iter()
                .filter(|r| r.status == TaskStatus::Completed)
                .count();
            info!(
                workflow_id = %run.id(),
                phase = index + 1,
                succeeded,
                failed = reports.len() - succeeded,
                "phase settled"
            );

            if aborted {
                break;
            }
            if let Some(report) = &critical {
                warn!(workflow_id = %run.id(), task = %report.task, "critical task failed, halting workflow");
                break;
            }
        }

        aborted |= *control.borrow() == RunControl::Aborted;
        self.finish(run, aborted, critical.as_ref()).await;

        let tracker = run.tracker();
        EngineOutcome {
            succeeded: tracker.names_with_status(TaskStatus::Completed).await,
            failed: tracker.names_with_status(TaskStatus::Failed).await,
            skipped: tracker.names_with_status(TaskStatus::Skipped).await,
            not_dispatched: tracker.names_with_status(TaskStatus::Pending).await,
            aborted,
            critical_failure: critical.map(|r| r.task),
        }
    }

    fn runner(&self, workflow: &Workflow, definitions: &[TaskDefinition], tracker: TaskStateTracker) -> TaskRunner {
        let definitions: BTreeMap<String, TaskDefinition> = definitions
            .iter()
            .map(|d| (d.name.clone(), d.clone()))
            .collect();

        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for def in definitions.values() {
            for dep in &def.dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(def.name.clone());
            }
        }

        TaskRunner {
            executor: self.executor.clone(),
            bus: self.bus.clone(),
            notifier: self.notifier.clone(),
            tracker,
            definitions: Arc::new(definitions),
            dependents: Arc::new(dependents),
            workflow_id: workflow.id,
            workflow_type: workflow.workflow_type.clone(),
            mode: workflow.mode,
            default_timeout: self.config.task_timeout,
        }
    }

    /// Spawn a phase's tasks and wait for all of them.
    ///
    /// An abort stops admission: tasks not yet spawned stay pending. The
    /// flag in the result is true when that happened.
    async fn fan_out(
        &self,
        runner: &TaskRunner,
        tasks: Vec<String>,
        limit: Option<usize>,
        control: &watch::Receiver<RunControl>,
    ) -> (Vec<TaskReport>, bool) {
        let semaphore = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut handles: Vec<(String, JoinHandle<TaskReport>)> = Vec::with_capacity(tasks.len());
        let mut halted = false;

        for task in tasks {
            // Admission happens here, in order, so higher priorities go first.
            let permit = match &semaphore {
                Some(sem) => sem.clone().acquire_owned().await.ok(),
                None => None,
            };
            if *control.borrow() == RunControl::Aborted {
                debug!(task = %task, "abort requested, not dispatching");
                halted = true;
                break;
            }

            let runner = runner.clone();
            let name = task.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                runner.run(name).await
            });
            handles.push((task, handle));
        }

        let settled = join_all(
            handles
                .into_iter()
                .map(|(task, handle)| async move { (task, handle.await) }),
        )
        .await;

        let mut reports = Vec::with_capacity(settled.len());
        for (task, joined) in settled {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(task = %task, error = %e, "task runner did not finish");
                    reports.push(runner.record_crash(&task, e.to_string()).await);
                }
            }
        }
        (reports, halted)
    }

    /// Mark every pending transitive dependent of a failed task as skipped.
    async fn skip_dependents(&self, runner: &TaskRunner, reports: &[TaskReport]) {
        for report in reports.iter().filter(|r| r.status == TaskStatus::Failed) {
            let mut seen = HashSet::new();
            let mut stack: Vec<String> = runner
                .dependents
                .get(&report.task)
                .cloned()
                .unwrap_or_default();

            while let Some(task) = stack.pop() {
                if !seen.insert(task.clone()) {
                    continue;
                }
                if runner.tracker.status(&task).await == Some(TaskStatus::Pending) {
                    let reason = format!("dependency '{}' failed", report.task);
                    match runner.tracker.mark_skipped(&task, reason).await {
                        Ok(_) => info!(task = %task, failed = %report.task, "task skipped"),
                        Err(e) => warn!(task = %task, error = %e, "could not skip task"),
                    }
                }
                if let Some(next) = runner.dependents.get(&task) {
                    stack.extend(next.iter().cloned());
                }
            }
        }
    }

    async fn begin(&self, run: &RunState) {
        let started = run
            .update_workflow(|wf| {
                if wf.status == WorkflowStatus::Pending {
                    wf.transition_to(WorkflowStatus::Running)
                } else {
                    Ok(())
                }
            })
            .await;
        if let Err(e) = started {
            warn!(workflow_id = %run.id(), error = %e, "could not mark workflow running");
        }
        self.persist(run).await;
    }

    async fn finish(&self, run: &RunState, aborted: bool, critical: Option<&TaskReport>) {
        let result = run
            .update_workflow(|wf| {
                // An abort issued through the API already settled the status.
                if wf.status.is_terminal() {
                    return Ok(());
                }
                if aborted {
                    return wf.transition_to(WorkflowStatus::Aborted);
                }
                if wf.status == WorkflowStatus::Paused {
                    wf.transition_to(WorkflowStatus::Running)?;
                }
                match critical {
                    Some(report) => wf.fail(format!(
                        "critical task '{}' failed: {}",
                        report.task,
                        report.error.as_deref().unwrap_or("unknown error")
                    )),
                    None => wf.transition_to(WorkflowStatus::Completed),
                }
            })
            .await;
        if let Err(e) = result {
            warn!(workflow_id = %run.id(), error = %e, "could not settle workflow status");
        }

        self.persist(run).await;
        let workflow = run.workflow().await;
        info!(
            workflow_id = %run.id(),
            status = %workflow.status,
            duration_ms = workflow.duration_ms(),
            "workflow finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executors::{ScriptedExecutor, ScriptedResponse};
    use crate::adapters::memory::{InMemoryMessageLog, InMemoryWorkflowStore};
    use crate::domain::errors::DomainResult;
    use crate::domain::models::OutgoingMessage;
    use crate::domain::ports::TaskOutcome;
    use crate::services::dependency_resolver::DependencyResolver;
    use async_trait::async_trait;

    struct Harness {
        engine: ExecutionEngine,
        executor: Arc<ScriptedExecutor>,
        store: Arc<InMemoryWorkflowStore>,
        bus: MessageBus,
    }

    fn harness(executor: ScriptedExecutor, config: ExecutorConfig) -> Harness {
        let executor = Arc::new(executor);
        let store = Arc::new(InMemoryWorkflowStore::new());
        let bus = MessageBus::new(Arc::new(InMemoryMessageLog::new()));
        let engine = ExecutionEngine::new(executor.clone(), bus.clone(), store.clone(), config);
        Harness {
            engine,
            executor,
            store,
            bus,
        }
    }

    fn diamond() -> Vec<TaskDefinition> {
        vec![
            TaskDefinition::new("a"),
            TaskDefinition::new("b"),
            TaskDefinition::new("c").with_dependencies(["a", "b"]),
            TaskDefinition::new("d").with_dependencies(["c"]),
        ]
    }

    fn prepare(defs: &[TaskDefinition], mode: ExecutionMode) -> RunState {
        let plan = DependencyResolver::new().resolve(defs).unwrap();
        let names = defs.iter().map(|d| d.name.clone()).collect();
        RunState::new(Workflow::new("test", mode, names), plan)
    }

    async fn run(h: &Harness, defs: &[TaskDefinition], mode: ExecutionMode) -> (RunState, EngineOutcome) {
        let state = prepare(defs, mode);
        let (_control, rx) = ControlHandle::channel();
        let outcome = h.engine.run(&state, defs, rx).await;
        (state, outcome)
    }

    #[tokio::test]
    async fn test_all_succeed_completes_workflow() {
        let h = harness(ScriptedExecutor::new(), ExecutorConfig::default());
        let (state, outcome) = run(&h, &diamond(), ExecutionMode::Intelligent).await;

        assert_eq!(outcome.succeeded, vec!["a", "b", "c", "d"]);
        assert!(outcome.failed.is_empty());
        assert_eq!(state.status().await, WorkflowStatus::Completed);
        assert_eq!(state.completed_phases(), 3);

        let stored = h.store.load(state.id()).await.unwrap();
        assert_eq!(stored.workflow.status, WorkflowStatus::Completed);
        assert_eq!(stored.completed_phases, 3);
    }

    #[tokio::test]
    async fn test_phase_barrier_holds() {
        let executor = ScriptedExecutor::new()
            .with_response("a", ScriptedResponse::default().with_delay(Duration::from_millis(80)));
        let h = harness(executor, ExecutorConfig::default());
        run(&h, &diamond(), ExecutionMode::Parallel).await;

        let a = h.executor.invocation("a").unwrap();
        let c = h.executor.invocation("c").unwrap();
        assert!(c.started_at >= a.finished_at.unwrap());
    }

    #[tokio::test]
    async fn test_sequential_never_overlaps() {
        let executor = ScriptedExecutor::with_default_response(
            ScriptedResponse::default().with_delay(Duration::from_millis(20)),
        );
        let h = harness(executor, ExecutorConfig::default());
        run(&h, &diamond(), ExecutionMode::Sequential).await;

        assert_eq!(h.executor.peak_concurrency(), 1);
        assert_eq!(h.executor.started_order(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_intelligent_respects_cap_and_priority() {
        let defs = vec![
            TaskDefinition::new("low").with_priority(Priority::Low),
            TaskDefinition::new("mid").with_priority(Priority::Medium),
            TaskDefinition::new("top").with_priority(Priority::Critical),
        ];
        let executor = ScriptedExecutor::with_default_response(
            ScriptedResponse::default().with_delay(Duration::from_millis(40)),
        );
        let config = ExecutorConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let h = harness(executor, config);
        run(&h, &defs, ExecutionMode::Intelligent).await;

        assert_eq!(h.executor.peak_concurrency(), 2);
        assert_eq!(h.executor.started_order(), vec!["top", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_timeout_is_task_failure() {
        let executor = ScriptedExecutor::new()
            .with_response("slow", ScriptedResponse::default().with_delay(Duration::from_secs(5)));
        let config = ExecutorConfig {
            task_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let h = harness(executor, config);
        let defs = vec![TaskDefinition::new("slow"), TaskDefinition::new("quick")];
        let (state, outcome) = run(&h, &defs, ExecutionMode::Parallel).await;

        assert_eq!(outcome.failed, vec!["slow"]);
        assert_eq!(outcome.succeeded, vec!["quick"]);
        let slow = state.tracker().get("slow").await.unwrap();
        assert_eq!(slow.error.as_deref(), Some("Task 'slow' timed out after 50ms"));
        assert_eq!(state.status().await, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn test_critical_failure_stops_later_phases() {
        let defs = vec![
            TaskDefinition::new("x").with_priority(Priority::Critical),
            TaskDefinition::new("y"),
            TaskDefinition::new("z").with_dependencies(["y"]),
        ];
        let executor = ScriptedExecutor::new().with_response("x", ScriptedResponse::failure("bad brand"));
        let h = harness(executor, ExecutorConfig::default());
        let (state, outcome) = run(&h, &defs, ExecutionMode::Intelligent).await;

        assert_eq!(outcome.critical_failure.as_deref(), Some("x"));
        assert_eq!(outcome.succeeded, vec!["y"]);
        assert_eq!(outcome.not_dispatched, vec!["z"]);
        let wf = state.workflow().await;
        assert_eq!(wf.status, WorkflowStatus::Failed);
        assert!(wf.error.unwrap().contains("critical task 'x' failed"));
    }

    #[tokio::test]
    async fn test_skip_policy_skips_transitive_dependents() {
        let executor = ScriptedExecutor::new().with_response("a", ScriptedResponse::failure("nope"));
        let config = ExecutorConfig {
            dependent_failure_policy: DependentFailurePolicy::Skip,
            ..Default::default()
        };
        let h = harness(executor, config);
        let (_, outcome) = run(&h, &diamond(), ExecutionMode::Parallel).await;

        assert_eq!(outcome.failed, vec!["a"]);
        assert_eq!(outcome.succeeded, vec!["b"]);
        assert_eq!(outcome.skipped, vec!["c", "d"]);
        assert!(h.executor.invocation("c").is_none());
    }

    #[tokio::test]
    async fn test_proceed_policy_still_dispatches_dependents() {
        let executor = ScriptedExecutor::new().with_response("a", ScriptedResponse::failure("nope"));
        let h = harness(executor, ExecutorConfig::default());
        let (_, outcome) = run(&h, &diamond(), ExecutionMode::Parallel).await;

        assert_eq!(outcome.failed, vec!["a"]);
        assert_eq!(outcome.succeeded, vec!["b", "c", "d"]);

        // c saw only b's output and a's error report
        let c = h.executor.invocation("c").unwrap();
        assert!(c.context.upstream.contains_key("b"));
        assert!(!c.context.upstream.contains_key("a"));
        let kinds: Vec<_> = c
            .context
            .inbox
            .iter()
            .map(|m| (m.from_task.as_str(), m.message_type))
            .collect();
        assert!(kinds.contains(&("a", MessageType::ErrorReport)));
        assert!(kinds.contains(&("b", MessageType::StatusUpdate)));
    }

    #[tokio::test]
    async fn test_outgoing_messages_reach_inbox() {
        let defs = vec![
            TaskDefinition::new("review"),
            TaskDefinition::new("rewrite").with_dependencies(["review"]),
        ];
        let outcome = TaskOutcome::success(serde_json::json!("reviewed")).with_message(
            OutgoingMessage::new(
                "rewrite",
                MessageType::ValidationFeedback,
                serde_json::json!({"fix": "tone"}),
            ),
        );
        let executor = ScriptedExecutor::new().with_response("review", ScriptedResponse::with_outcome(outcome));
        let h = harness(executor, ExecutorConfig::default());
        let (state, _) = run(&h, &defs, ExecutionMode::Sequential).await;

        let rewrite = h.executor.invocation("rewrite").unwrap();
        assert!(rewrite
            .context
            .inbox
            .iter()
            .any(|m| m.message_type == MessageType::ValidationFeedback
                && m.payload == serde_json::json!({"fix": "tone"})));
        assert_eq!(rewrite.context.upstream["review"], serde_json::json!("reviewed"));
        assert_eq!(h.bus.history(state.id()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_abort_before_run_dispatches_nothing() {
        let h = harness(ScriptedExecutor::new(), ExecutorConfig::default());
        let defs = diamond();
        let state = prepare(&defs, ExecutionMode::Intelligent);
        let (control, rx) = ControlHandle::channel();
        assert!(control.abort());
        assert!(!control.resume());

        let outcome = h.engine.run(&state, &defs, rx).await;
        assert!(outcome.aborted);
        assert_eq!(outcome.not_dispatched.len(), 4);
        assert_eq!(state.status().await, WorkflowStatus::Aborted);
        assert!(h.executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_abort_stops_tasks_queued_behind_cap() {
        let executor = ScriptedExecutor::with_default_response(
            ScriptedResponse::default().with_delay(Duration::from_millis(60)),
        );
        let config = ExecutorConfig {
            max_concurrency: 1,
            ..ExecutorConfig::default()
        };
        let h = Arc::new(harness(executor, config));
        let defs = vec![
            TaskDefinition::new("a"),
            TaskDefinition::new("b"),
            TaskDefinition::new("c"),
        ];
        let state = prepare(&defs, ExecutionMode::Intelligent);
        let (control, rx) = ControlHandle::channel();

        let task = {
            let h = h.clone();
            let state = state.clone();
            let defs = defs.clone();
            tokio::spawn(async move { h.engine.run(&state, &defs, rx).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(control.abort());
        let outcome = task.await.unwrap();

        assert!(outcome.aborted);
        assert_eq!(h.executor.started_order(), vec!["a"]);
        assert_eq!(outcome.succeeded, vec!["a"]);
        assert_eq!(outcome.not_dispatched, vec!["b", "c"]);
        assert_eq!(state.tracker().status("b").await, Some(TaskStatus::Pending));
        assert_eq!(state.completed_phases(), 0);
        assert_eq!(state.status().await, WorkflowStatus::Aborted);
    }

    #[tokio::test]
    async fn test_pause_holds_next_phase_until_resume() {
        let executor = ScriptedExecutor::new()
            .with_response("a", ScriptedResponse::default().with_delay(Duration::from_millis(30)));
        let h = Arc::new(harness(executor, ExecutorConfig::default()));
        let defs = diamond();
        let state = prepare(&defs, ExecutionMode::Parallel);
        let (control, rx) = ControlHandle::channel();

        let task = {
            let h = h.clone();
            let state = state.clone();
            let defs = defs.clone();
            tokio::spawn(async move { h.engine.run(&state, &defs, rx).await })
        };

        control.pause();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(state.tracker().status("c").await, Some(TaskStatus::Pending));

        control.resume();
        let outcome = task.await.unwrap();
        assert_eq!(outcome.succeeded.len(), 4);
    }

    struct FailingStore;

    #[async_trait]
    impl WorkflowStore for FailingStore {
        async fn snapshot(&self, _snapshot: &WorkflowSnapshot) -> DomainResult<()> {
            Err(OrchestrationError::Persistence("read-only filesystem".to_string()))
        }
        async fn load(&self, workflow_id: Uuid) -> DomainResult<WorkflowSnapshot> {
            Err(OrchestrationError::WorkflowNotFound(workflow_id))
        }
        async fn list_recent(&self, _limit: usize) -> DomainResult<Vec<Workflow>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_is_a_warning() {
        let bus = MessageBus::new(Arc::new(InMemoryMessageLog::new()));
        let engine = ExecutionEngine::new(
            Arc::new(ScriptedExecutor::new()),
            bus,
            Arc::new(FailingStore),
            ExecutorConfig::default(),
        );
        let defs = diamond();
        let state = prepare(&defs, ExecutionMode::Intelligent);
        let (_control, rx) = ControlHandle::channel();
        let outcome = engine.run(&state, &defs, rx).await;

        assert_eq!(outcome.succeeded.len(), 4);
        let wf = state.workflow().await;
        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert!(!wf.warnings.is_empty());
        assert!(wf.warnings[0].contains("read-only filesystem"));
    }
}
