use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{Workflow, WorkflowSnapshot};
use crate::domain::ports::WorkflowStore;

/// Workflow store kept in a map; lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    snapshots: RwLock<HashMap<Uuid, WorkflowSnapshot>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn snapshot(&self, snapshot: &WorkflowSnapshot) -> DomainResult<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.workflow.id, snapshot.clone());
        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> DomainResult<WorkflowSnapshot> {
        self.snapshots
            .read()
            .await
            .get(&workflow_id)
            .cloned()
            .ok_or(OrchestrationError::WorkflowNotFound(workflow_id))
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Workflow>> {
        let snapshots = self.snapshots.read().await;
        let mut all: Vec<&WorkflowSnapshot> = snapshots.values().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all
            .into_iter()
            .take(limit)
            .map(|s| s.workflow.clone())
            .collect())
    }
}
