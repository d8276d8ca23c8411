//! SQLite implementation of the WorkflowStore.

use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{Workflow, WorkflowSnapshot};
use crate::domain::ports::WorkflowStore;

/// One row per workflow, replaced on every snapshot. The full snapshot is
/// kept as JSON; the other columns exist for querying.
#[derive(Clone)]
pub struct SqliteWorkflowStore {
    pool: SqlitePool,
}

impl SqliteWorkflowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn timestamp(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn snapshot(&self, snapshot: &WorkflowSnapshot) -> DomainResult<()> {
        let workflow = &snapshot.workflow;
        let snapshot_json = serde_json::to_string(snapshot)?;

        sqlx::query(
            "INSERT INTO workflows (id, workflow_type, mode, status, snapshot_json, started_at, ended_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                snapshot_json = excluded.snapshot_json,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                updated_at = excluded.updated_at",
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.workflow_type)
        .bind(workflow.mode.as_str())
        .bind(workflow.status.as_str())
        .bind(&snapshot_json)
        .bind(workflow.started_at.map(timestamp))
        .bind(workflow.ended_at.map(timestamp))
        .bind(timestamp(snapshot.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> DomainResult<WorkflowSnapshot> {
        let row: Option<(String,)> = sqlx::query_as("SELECT snapshot_json FROM workflows WHERE id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json)?),
            None => Err(OrchestrationError::WorkflowNotFound(workflow_id)),
        }
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Workflow>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT snapshot_json FROM workflows ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(json,)| {
                serde_json::from_str::<WorkflowSnapshot>(&json)
                    .map(|s| s.workflow)
                    .map_err(OrchestrationError::from)
            })
            .collect()
    }
}
