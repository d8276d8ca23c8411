//! Event notifier port: side-channel announcements of task lifecycle events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle event reported to notifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    Started,
    Completed,
    Failed,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Notifier backend unavailable: {0}")]
    Unavailable(String),
    #[error("Notification failed: {0}")]
    Failed(String),
}

/// Fire-and-forget observer of task events.
///
/// Implementations must not block. Callers ignore returned errors.
pub trait EventNotifier: Send + Sync {
    fn notify(&self, task: &str, event: TaskEvent, message: &str) -> Result<(), NotifierError>;
}
