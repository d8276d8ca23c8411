//! Call-site wrapper for event notifiers.
//!
//! A notifier must never influence task or workflow state, so every call
//! from the engine goes through `notify_quietly`, which discards errors and
//! contains panics raised by the notifier.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use crate::domain::ports::{EventNotifier, TaskEvent};

/// Notify and ignore the result.
pub fn notify_quietly(notifier: &dyn EventNotifier, task: &str, event: TaskEvent, message: &str) {
    match catch_unwind(AssertUnwindSafe(|| notifier.notify(task, event, message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(task, %event, error = %e, "event notifier failed"),
        Err(_) => debug!(task, %event, "event notifier panicked"),
    }
}

/// Optional notifier attached to the execution engine.
#[derive(Clone, Default)]
pub struct NotifierHandle {
    inner: Option<Arc<dyn EventNotifier>>,
}

impl NotifierHandle {
    pub fn new(notifier: Arc<dyn EventNotifier>) -> Self {
        Self {
            inner: Some(notifier),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    pub fn emit(&self, task: &str, event: TaskEvent, message: &str) {
        if let Some(notifier) = &self.inner {
            notify_quietly(notifier.as_ref(), task, event, message);
        }
    }
}
