//! Workflow state store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Workflow, WorkflowSnapshot};

/// Durable record of workflow progress. Audit artifact only: nothing
/// resumes a workflow from it.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert or replace the snapshot for `snapshot.workflow.id`.
    async fn snapshot(&self, snapshot: &WorkflowSnapshot) -> DomainResult<()>;

    /// Latest snapshot of a workflow, or `WorkflowNotFound`.
    async fn load(&self, workflow_id: Uuid) -> DomainResult<WorkflowSnapshot>;

    /// Most recently updated workflows first.
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Workflow>>;
}
