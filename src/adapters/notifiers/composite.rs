//! Fan-out notifier.

use std::sync::Arc;

use crate::domain::ports::{EventNotifier, NotifierError, TaskEvent};

/// Forwards each event to every member. A failing member does not stop the
/// others; the first error is reported after all members ran.
#[derive(Clone, Default)]
pub struct CompositeNotifier {
    members: Vec<Arc<dyn EventNotifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.members.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl EventNotifier for CompositeNotifier {
    fn notify(&self, task: &str, event: TaskEvent, message: &str) -> Result<(), NotifierError> {
        let mut first_error = None;
        for member in &self.members {
            if let Err(e) = member.notify(task, event, message) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
