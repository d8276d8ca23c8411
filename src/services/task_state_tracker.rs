//! Per-workflow task state tracker.
//!
//! Holds one `TaskState` per task. Only the execution engine mutates a
//! task's entry, and only while that task is in flight; readers get clones.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{TaskState, TaskStatus};

#[derive(Debug, Clone, Default)]
pub struct TaskStateTracker {
    states: Arc<RwLock<BTreeMap<String, TaskState>>>,
}

impl TaskStateTracker {
    /// Tracker with every task pending.
    pub fn new<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states = tasks
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), TaskState::new(name))
            })
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    async fn update<F>(&self, task: &str, f: F) -> DomainResult<TaskState>
    where
        F: FnOnce(&mut TaskState) -> DomainResult<()>,
    {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(task)
            .ok_or_else(|| OrchestrationError::UnknownTask(task.to_string()))?;
        f(state)?;
        Ok(state.clone())
    }

    /// pending -> running. Returns the attempt number.
    pub async fn mark_running(&self, task: &str) -> DomainResult<u32> {
        self.update(task, TaskState::start)
            .await
            .map(|s| s.attempts)
    }

    pub async fn mark_completed(&self, task: &str, output: serde_json::Value) -> DomainResult<TaskState> {
        self.update(task, |s| s.complete(output)).await
    }

    pub async fn mark_failed(&self, task: &str, error: impl Into<String>) -> DomainResult<TaskState> {
        let error = error.into();
        self.update(task, |s| s.fail(error)).await
    }

    pub async fn mark_skipped(&self, task: &str, reason: impl Into<String>) -> DomainResult<TaskState> {
        let reason = reason.into();
        self.update(task, |s| s.skip(reason)).await
    }

    pub async fn get(&self, task: &str) -> Option<TaskState> {
        self.states.read().await.get(task).cloned()
    }

    pub async fn status(&self, task: &str) -> Option<TaskStatus> {
        self.states.read().await.get(task).map(|s| s.status)
    }

    /// Output of a task if it completed.
    pub async fn output(&self, task: &str) -> Option<serde_json::Value> {
        let states = self.states.read().await;
        states
            .get(task)
            .filter(|s| s.status == TaskStatus::Completed)
            .and_then(|s| s.output.clone())
    }

    /// All states, ordered by task name.
    pub async fn snapshot(&self) -> Vec<TaskState> {
        self.states.read().await.values().cloned().collect()
    }

    pub async fn names_with_status(&self, status: TaskStatus) -> Vec<String> {
        self.states
            .read()
            .await
            .values()
            .filter(|s| s.status == status)
            .map(|s| s.task_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_tasks_start_pending() {
        let tracker = TaskStateTracker::new(["b", "a"]);
        let states = tracker.snapshot().await;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].task_name, "a");
        assert!(states.iter().all(|s| s.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_lifecycle_and_output() {
        let tracker = TaskStateTracker::new(["a"]);
        assert_eq!(tracker.mark_running("a").await.unwrap(), 1);
        assert_eq!(tracker.output("a").await, None);

        tracker
            .mark_completed("a", serde_json::json!({"draft": "hello"}))
            .await
            .unwrap();
        assert_eq!(tracker.status("a").await, Some(TaskStatus::Completed));
        assert_eq!(
            tracker.output("a").await,
            Some(serde_json::json!({"draft": "hello"}))
        );
    }

    #[tokio::test]
    async fn test_unknown_task_rejected() {
        let tracker = TaskStateTracker::new(["a"]);
        assert_eq!(
            tracker.mark_running("ghost").await.unwrap_err(),
            OrchestrationError::UnknownTask("ghost".to_string())
        );
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_distinct_tasks() {
        let names: Vec<String> = (0..32).map(|i| format!("t{i:02}")).collect();
        let tracker = TaskStateTracker::new(names.clone());

        let handles: Vec<_> = names
            .iter()
            .cloned()
            .map(|name| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    tracker.mark_running(&name).await.unwrap();
                    tracker.mark_failed(&name, "nope").await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tracker.names_with_status(TaskStatus::Failed).await.len(), 32);
    }
}
