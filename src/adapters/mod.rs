//! Adapters implementing the domain ports.

pub mod executors;
pub mod memory;
pub mod notifiers;
pub mod sqlite;
