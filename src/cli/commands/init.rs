//! Implementation of the `conductor init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("  config:   {}", self.config_path.display()));
        }
        if self.success {
            lines.push(format!("  database: {}", self.database_path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let out = init_project(&args).await?;
    output(&out, json_mode);
    Ok(())
}

async fn init_project(args: &InitArgs) -> Result<InitOutput> {
    let target = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let conductor_dir = target.join(CONFIG_DIR);
    let config_path = conductor_dir.join("config.yaml");

    let mut config = Config::default();
    let database_path = target.join(&config.database.path);

    if config_path.exists() && !args.force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite config.yaml."
                .to_string(),
            config_path,
            config_written: false,
            database_path,
        });
    }

    fs::create_dir_all(&conductor_dir)
        .await
        .with_context(|| format!("Failed to create {}", conductor_dir.display()))?;

    let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    config.database.path = database_path.display().to_string();
    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    Ok(InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized.".to_string()
        } else {
            "Project initialized.".to_string()
        },
        config_path,
        config_written: true,
        database_path,
    })
}
