//! SQLite implementation of the MessageLog.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{Message, MessageType, Priority};
use crate::domain::ports::MessageLog;

/// Append-only message table. `seq` gives insertion order; draining sets
/// `delivered_at` instead of deleting rows.
#[derive(Clone)]
pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT seq, id, workflow_id, from_task, to_task, message_type, payload_json, priority, created_at FROM messages";

#[async_trait]
impl MessageLog for SqliteMessageLog {
    async fn append(&self, message: &Message) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, workflow_id, from_task, to_task, message_type, payload_json, priority, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.workflow_id.to_string())
        .bind(&message.from_task)
        .bind(&message.to_task)
        .bind(message.message_type.as_str())
        .bind(serde_json::to_string(&message.payload)?)
        .bind(message.priority.as_str())
        .bind(message.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn drain(&self, workflow_id: Uuid, to_task: &str) -> DomainResult<Vec<Message>> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE workflow_id = ? AND to_task = ? AND delivered_at IS NULL ORDER BY seq"
        ))
        .bind(workflow_id.to_string())
        .bind(to_task)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(last) = rows.last() {
            sqlx::query(
                "UPDATE messages SET delivered_at = ?
                 WHERE workflow_id = ? AND to_task = ? AND delivered_at IS NULL AND seq <= ?",
            )
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
            .bind(workflow_id.to_string())
            .bind(to_task)
            .bind(last.seq)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn list(&self, workflow_id: Uuid) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE workflow_id = ? ORDER BY seq"
        ))
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    seq: i64,
    id: String,
    workflow_id: String,
    from_task: String,
    to_task: String,
    message_type: String,
    payload_json: String,
    priority: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = OrchestrationError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let message_type = MessageType::from_str(&row.message_type).ok_or_else(|| {
            OrchestrationError::Serialization(format!("unknown message type '{}'", row.message_type))
        })?;
        let priority = Priority::from_str(&row.priority).ok_or_else(|| {
            OrchestrationError::Serialization(format!("unknown priority '{}'", row.priority))
        })?;

        Ok(Message {
            id: parse_uuid(&row.id)?,
            workflow_id: parse_uuid(&row.workflow_id)?,
            from_task: row.from_task,
            to_task: row.to_task,
            message_type,
            payload: serde_json::from_str(&row.payload_json)?,
            priority,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
