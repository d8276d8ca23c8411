//! Event notifier adapters.

pub mod command;
pub mod composite;
pub mod tracing_notifier;

pub use command::CommandNotifier;
pub use composite::CompositeNotifier;
pub use tracing_notifier::TracingNotifier;
