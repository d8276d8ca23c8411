//! Notifier that writes task events to the log.

use tracing::{info, warn};

use crate::domain::ports::{EventNotifier, NotifierError, TaskEvent};

#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl EventNotifier for TracingNotifier {
    fn notify(&self, task: &str, event: TaskEvent, message: &str) -> Result<(), NotifierError> {
        match event {
            TaskEvent::Failed => warn!(task, event = %event, "{}", message),
            _ => info!(task, event = %event, "{}", message),
        }
        Ok(())
    }
}
