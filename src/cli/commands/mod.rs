//! CLI command implementations.

pub mod init;
pub mod message;
pub mod plan;
pub mod run;
pub mod tasks;
pub mod workflow;
