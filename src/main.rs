//! Conductor CLI entry point.

use clap::Parser;

use conductor::cli::commands::{init, message, plan, run, tasks, workflow};
use conductor::cli::{app, handle_error, Cli, Commands};
use conductor::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match app::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => init::execute(args, cli.json).await,
        Commands::Run(args) => run::execute(args, &config, cli.json).await,
        Commands::Plan(args) => plan::execute(args, &config, cli.json),
        Commands::Tasks(args) => tasks::execute(args, &config, cli.json),
        Commands::Workflow(args) => workflow::execute(args, &config, cli.json).await,
        Commands::Message(args) => message::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
