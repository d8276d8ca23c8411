//! In-memory port implementations for tests and ephemeral runs.

pub mod message_log;
pub mod workflow_store;

pub use message_log::InMemoryMessageLog;
pub use workflow_store::InMemoryWorkflowStore;
