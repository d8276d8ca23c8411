//! Message bus for inter-task feedback.
//!
//! Messages go to a durable append-only log keyed by workflow id and are
//! handed to the addressed task on its next dispatch. Delivery is
//! at-most-once and best-effort: there is no acknowledgment or redelivery,
//! and the orchestrator does not act on message content.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{Message, MessageType, Priority};
use crate::domain::ports::MessageLog;

#[derive(Clone)]
pub struct MessageBus {
    log: Arc<dyn MessageLog>,
}

impl MessageBus {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self { log }
    }

    /// Append a message to its workflow's log.
    pub async fn send(&self, message: Message) -> DomainResult<Uuid> {
        if message.to_task.trim().is_empty() {
            return Err(OrchestrationError::Delivery(
                "message has no recipient".to_string(),
            ));
        }

        self.log
            .append(&message)
            .await
            .map_err(|e| OrchestrationError::Delivery(e.to_string()))?;

        debug!(
            workflow_id = %message.workflow_id,
            message_id = %message.id,
            from = %message.from_task,
            to = %message.to_task,
            message_type = %message.message_type,
            "message queued"
        );
        Ok(message.id)
    }

    /// Build and send a message in one step.
    pub async fn communicate(
        &self,
        workflow_id: Uuid,
        from_task: &str,
        to_task: &str,
        message_type: MessageType,
        payload: serde_json::Value,
        priority: Option<Priority>,
    ) -> DomainResult<Uuid> {
        let message = Message::new(workflow_id, from_task, to_task, message_type, payload)
            .with_priority(priority.unwrap_or_default());
        self.send(message).await
    }

    /// Send, logging and dropping any delivery error.
    pub async fn send_best_effort(&self, message: Message) -> Option<Uuid> {
        let to_task = message.to_task.clone();
        match self.send(message).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(to = %to_task, error = %e, "dropping undeliverable message");
                None
            }
        }
    }

    /// Take every undelivered message addressed to `task`.
    pub async fn drain(&self, workflow_id: Uuid, task: &str) -> DomainResult<Vec<Message>> {
        self.log
            .drain(workflow_id, task)
            .await
            .map_err(|e| OrchestrationError::Delivery(e.to_string()))
    }

    /// Every message of a workflow, delivered or not.
    pub async fn history(&self, workflow_id: Uuid) -> DomainResult<Vec<Message>> {
        self.log.list(workflow_id).await
    }
}
