//! Scripted task executor for testing.
//!
//! Every task gets a configurable response (outcome plus artificial delay)
//! and every invocation is recorded so tests can inspect ordering and
//! overlap.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::ports::{TaskExecutor, TaskOutcome, WorkflowContext};

/// Scripted response for one task.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub outcome: TaskOutcome,
    /// Time to sleep before returning.
    pub delay: Duration,
    /// Return this as an `Err` instead of the outcome.
    pub raise: Option<String>,
}

impl Default for ScriptedResponse {
    fn default() -> Self {
        Self {
            outcome: TaskOutcome::success(serde_json::json!("ok")),
            delay: Duration::ZERO,
            raise: None,
        }
    }
}

impl ScriptedResponse {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            outcome: TaskOutcome::success(output),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            outcome: TaskOutcome::failure(error),
            ..Default::default()
        }
    }

    /// Executor-level error rather than an unsuccessful outcome.
    pub fn raising(error: impl Into<String>) -> Self {
        Self {
            raise: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_outcome(outcome: TaskOutcome) -> Self {
        Self {
            outcome,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One recorded call to `execute`.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task: String,
    pub context: WorkflowContext,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
}

impl Invocation {
    /// Whether two invocations were in flight at the same time.
    pub fn overlaps(&self, other: &Invocation) -> bool {
        let self_end = self.finished_at.unwrap_or_else(Instant::now);
        let other_end = other.finished_at.unwrap_or_else(Instant::now);
        self.started_at < other_end && other.started_at < self_end
    }
}

/// Deterministic executor driven by per-task responses.
pub struct ScriptedExecutor {
    default_response: ScriptedResponse,
    responses: RwLock<HashMap<String, ScriptedResponse>>,
    invocations: Mutex<Vec<Invocation>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::with_default_response(ScriptedResponse::default())
    }

    pub fn with_default_response(response: ScriptedResponse) -> Self {
        Self {
            default_response: response,
            responses: RwLock::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Builder form of `set_response`.
    pub fn with_response(mut self, task: impl Into<String>, response: ScriptedResponse) -> Self {
        self.responses.get_mut().insert(task.into(), response);
        self
    }

    pub async fn set_response(&self, task: impl Into<String>, response: ScriptedResponse) {
        self.responses.write().await.insert(task.into(), response);
    }

    async fn response_for(&self, task: &str) -> ScriptedResponse {
        self.responses
            .read()
            .await
            .get(task)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone())
    }

    /// Recorded invocations in start order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Task names in the order they were started.
    pub fn started_order(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.task).collect()
    }

    pub fn invocation(&self, task: &str) -> Option<Invocation> {
        self.invocations().into_iter().find(|i| i.task == task)
    }

    /// Highest number of simultaneously running invocations seen.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record_start(&self, task: &str, ctx: &WorkflowContext) -> usize {
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_running, Ordering::SeqCst);

        let mut invocations = match self.invocations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        invocations.push(Invocation {
            task: task.to_string(),
            context: ctx.clone(),
            started_at: Instant::now(),
            finished_at: None,
        });
        invocations.len() - 1
    }

    fn record_finish(&self, index: usize) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut invocations = match self.invocations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(inv) = invocations.get_mut(index) {
            inv.finished_at = Some(Instant::now());
        }
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn execute(&self, task: &str, ctx: &WorkflowContext) -> DomainResult<TaskOutcome> {
        let response = self.response_for(task).await;
        let index = self.record_start(task, ctx);

        // The guard keeps the in-flight count right when the engine's
        // timeout drops this future mid-sleep.
        let _finish = FinishGuard { executor: self, index };

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        match response.raise {
            Some(message) => Err(OrchestrationError::TaskExecution {
                task: task.to_string(),
                message,
            }),
            None => Ok(response.outcome),
        }
    }
}

struct FinishGuard<'a> {
    executor: &'a ScriptedExecutor,
    index: usize,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.executor.record_finish(self.index);
    }
}
