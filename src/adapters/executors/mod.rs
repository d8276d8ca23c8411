//! Task executor adapters.

pub mod command;
pub mod noop;
pub mod scripted;

pub use command::CommandExecutor;
pub use noop::NoopExecutor;
pub use scripted::{Invocation, ScriptedExecutor, ScriptedResponse};
