//! Inter-task messages carried by the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Priority;

/// Kind of message one task sends another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    DataRequest,
    ValidationFeedback,
    StatusUpdate,
    ErrorReport,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataRequest => "data-request",
            Self::ValidationFeedback => "validation-feedback",
            Self::StatusUpdate => "status-update",
            Self::ErrorReport => "error-report",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "data-request" => Some(Self::DataRequest),
            "validation-feedback" => Some(Self::ValidationFeedback),
            "status-update" => Some(Self::StatusUpdate),
            "error-report" => Some(Self::ErrorReport),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as stored in the workflow's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub from_task: String,
    pub to_task: String,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        workflow_id: Uuid,
        from_task: impl Into<String>,
        to_task: impl Into<String>,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            from_task: from_task.into(),
            to_task: to_task.into(),
            message_type,
            payload,
            priority: Priority::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// A message a task asks to send once it settles. The sender and workflow
/// are filled in by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to_task: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
}

impl OutgoingMessage {
    pub fn new(to_task: impl Into<String>, message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            to_task: to_task.into(),
            message_type,
            payload,
            priority: Priority::default(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn into_message(self, workflow_id: Uuid, from_task: &str) -> Message {
        Message::new(workflow_id, from_task, self.to_task, self.message_type, self.payload)
            .with_priority(self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_serde_is_kebab_case() {
        let json = serde_json::to_string(&MessageType::ValidationFeedback).unwrap();
        assert_eq!(json, "\"validation-feedback\"");
        assert_eq!(
            MessageType::from_str("status_update"),
            Some(MessageType::StatusUpdate)
        );
        assert_eq!(MessageType::from_str("gossip"), None);
    }

    #[test]
    fn test_outgoing_into_message() {
        let workflow_id = Uuid::new_v4();
        let msg = OutgoingMessage::new(
            "content-generation",
            MessageType::ValidationFeedback,
            serde_json::json!({"issues": ["tone"]}),
        )
        .with_priority(Priority::High)
        .into_message(workflow_id, "compliance-check");

        assert_eq!(msg.workflow_id, workflow_id);
        assert_eq!(msg.from_task, "compliance-check");
        assert_eq!(msg.to_task, "content-generation");
        assert_eq!(msg.priority, Priority::High);
    }
}
