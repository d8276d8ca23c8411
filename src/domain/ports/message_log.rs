//! Message log port backing the message bus.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Message;

/// Append-only, per-workflow log of inter-task messages.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append a message.
    async fn append(&self, message: &Message) -> DomainResult<()>;

    /// Undelivered messages addressed to `to_task`, in insertion order.
    /// Returned messages are marked delivered and never returned again.
    async fn drain(&self, workflow_id: Uuid, to_task: &str) -> DomainResult<Vec<Message>>;

    /// Every message of a workflow, delivered or not, in insertion order.
    async fn list(&self, workflow_id: Uuid) -> DomainResult<Vec<Message>>;
}
