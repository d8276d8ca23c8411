pub mod dependency_resolver;
pub mod event_notifier;
pub mod execution_engine;
pub mod message_bus;
pub mod orchestrator;
pub mod task_state_tracker;

pub use dependency_resolver::DependencyResolver;
pub use event_notifier::{notify_quietly, NotifierHandle};
pub use execution_engine::{
    ControlHandle, EngineOutcome, ExecutionEngine, ExecutorConfig, RunControl, RunState,
};
pub use message_bus::MessageBus;
pub use orchestrator::{MonitorReport, OrchestrateRequest, Orchestrator, WorkflowHandle};
pub use task_state_tracker::TaskStateTracker;
