mod config;
mod history;
mod logging;
mod project;

use anyhow::{Context, Result};
use aoc_projects::ProjectManager;
use aoc_storage::ProjectStore;
use clap::{Parser, Subcommand};
use config::CliConfig;
use history::{handle_history_command, HistoryCommand};
use project::{handle_project_command, ProjectCommand};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "aoc")]
#[command(about = "Agent Ops Cockpit project registry", long_about = None)]
struct Cli {
    /// Project database to use instead of the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage registered projects
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Inspect and maintain recently used project paths
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::load()?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    logging::init_logging(&config);

    let mut manager = open_manager(&config)?;
    match cli.command {
        Commands::Project { action } => handle_project_command(&mut manager, action),
        Commands::History { action } => handle_history_command(&mut manager, action),
    }
}

fn open_manager(config: &CliConfig) -> Result<ProjectManager<ProjectStore>> {
    let db_path = config.resolved_database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    debug!(event = "open_project_store", path = %db_path.display());

    let store = ProjectStore::open(&db_path)
        .with_context(|| format!("Failed to open project database {}", db_path.display()))?;
    let mut manager = ProjectManager::new(store).context("Failed to load project registry")?;
    manager.set_history_limit(config.history_limit);
    Ok(manager)
}
