//! Port trait definitions (Hexagonal Architecture)
//!
//! - TaskExecutor: invoke a named task
//! - WorkflowStore: persist workflow snapshots
//! - MessageLog: durable inter-task message log
//! - EventNotifier: side-channel task event announcements

pub mod event_notifier;
pub mod message_log;
pub mod task_executor;
pub mod workflow_store;

pub use event_notifier::{EventNotifier, NotifierError, TaskEvent};
pub use message_log::MessageLog;
pub use task_executor::{TaskExecutor, TaskOutcome, WorkflowContext};
pub use workflow_store::WorkflowStore;
