//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or compact console output
//! - Rolling JSON log files

pub mod config;
pub mod logger;

pub use config::{LogFormat, LogSettings, RotationPolicy};
pub use logger::LoggerImpl;
