//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::init::InitArgs;
use crate::cli::commands::message::MessageArgs;
use crate::cli::commands::plan::PlanArgs;
use crate::cli::commands::run::RunArgs;
use crate::cli::commands::tasks::TasksArgs;
use crate::cli::commands::workflow::WorkflowArgs;

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Conductor - dependency-aware workflow orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .conductor/
    #[arg(short, long, global = true, env = "CONDUCTOR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .conductor/ with a default config and database
    Init(InitArgs),

    /// Run a workflow to completion
    Run(RunArgs),

    /// Show the execution phases of a workflow without running it
    Plan(PlanArgs),

    /// List the tasks registered for a workflow type
    Tasks(TasksArgs),

    /// Inspect recorded workflows
    Workflow(WorkflowArgs),

    /// Send or list inter-task messages
    Message(MessageArgs),
}
