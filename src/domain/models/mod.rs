pub mod config;
pub mod message;
pub mod plan;
pub mod registry;
pub mod task;
pub mod workflow;

pub use config::{
    Config, DatabaseConfig, DependentFailurePolicy, EngineConfig, ExecutorKind, ExecutorSettings,
    LoggingConfig, NotifierConfig,
};
pub use message::{Message, MessageType, OutgoingMessage};
pub use plan::ExecutionPlan;
pub use registry::{TaskRegistry, WorkflowType, CONTENT_WORKFLOW};
pub use task::{Priority, TaskDefinition, TaskState, TaskStatus};
pub use workflow::{
    ExecutionMode, Workflow, WorkflowAction, WorkflowSnapshot, WorkflowStatus, WorkflowSummary,
};
