use anyhow::{Context, Result};
use aoc_core::{HistoryEntry, ProjectStorage};
use aoc_projects::ProjectManager;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum HistoryCommand {
    List(HistoryListArgs),
    Clear(HistoryClearArgs),
    Prune,
}

#[derive(Args, Debug)]
pub struct HistoryListArgs {
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long, alias = "query")]
    pub filter: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HistoryClearArgs {
    #[arg(long, default_value_t = 0)]
    pub keep: usize,
}

pub fn handle_history_command<S: ProjectStorage>(
    manager: &mut ProjectManager<S>,
    command: HistoryCommand,
) -> Result<()> {
    match command {
        HistoryCommand::List(args) => list_history(manager, &args),
        HistoryCommand::Clear(args) => {
            manager
                .clear_project_history(args.keep)
                .context("Failed to clear project history")?;
            println!("History trimmed to the {} most recent entries.", args.keep);
            Ok(())
        }
        HistoryCommand::Prune => {
            let removed = manager
                .cleanup_non_existent_projects()
                .context("Failed to prune project history")?;
            println!("Removed {removed} missing path(s) from history.");
            Ok(())
        }
    }
}

fn list_history<S: ProjectStorage>(
    manager: &ProjectManager<S>,
    args: &HistoryListArgs,
) -> Result<()> {
    let mut paths = match args.filter.as_deref() {
        Some(query) => manager.filter_project_paths(query),
        None => manager.recent_project_paths(),
    };
    if let Some(top) = args.top {
        paths.truncate(top);
    }

    if args.json {
        let entries = select_entries(manager, &paths);
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if paths.is_empty() {
        println!("No project history.");
        return Ok(());
    }
    for entry in select_entries(manager, &paths) {
        println!(
            "{} (used {}x, last {})",
            entry.path,
            entry.use_count,
            entry.last_used.to_rfc3339()
        );
    }
    Ok(())
}

fn select_entries<'a, S: ProjectStorage>(
    manager: &'a ProjectManager<S>,
    paths: &[String],
) -> Vec<&'a HistoryEntry> {
    let Some(history) = manager.project_history() else {
        return Vec::new();
    };
    paths
        .iter()
        .filter_map(|path| history.entries().iter().find(|entry| &entry.path == path))
        .collect()
}
