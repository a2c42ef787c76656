use anyhow::{Context, Result};
use aoc_core::{Project, ProjectStorage};
use aoc_projects::ProjectManager;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum ProjectCommand {
    Add(ProjectAddArgs),
    #[command(alias = "ls")]
    List(ProjectListArgs),
    Show(ProjectShowArgs),
    #[command(alias = "use")]
    Activate(ProjectTargetArgs),
    #[command(alias = "rm")]
    Remove(ProjectTargetArgs),
    Active(ProjectActiveArgs),
    Attach(ProjectInstanceArgs),
    Detach(ProjectInstanceArgs),
    Validate(ProjectValidateArgs),
}

#[derive(Args, Debug)]
pub struct ProjectAddArgs {
    pub path: String,
    #[arg(long, default_value = "")]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ProjectListArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProjectShowArgs {
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProjectActiveArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProjectTargetArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ProjectInstanceArgs {
    pub project: String,
    pub instance: String,
}

#[derive(Args, Debug)]
pub struct ProjectValidateArgs {
    pub path: String,
}

pub fn handle_project_command<S: ProjectStorage>(
    manager: &mut ProjectManager<S>,
    command: ProjectCommand,
) -> Result<()> {
    match command {
        ProjectCommand::Add(args) => add_project(manager, &args),
        ProjectCommand::List(args) => list_projects(manager, &args),
        ProjectCommand::Show(args) => {
            let project = manager
                .project(&args.id)
                .with_context(|| format!("No project with id '{}'", args.id))?;
            print_project(project, args.json)
        }
        ProjectCommand::Activate(args) => {
            manager
                .set_active_project(&args.id)
                .with_context(|| format!("Failed to activate project '{}'", args.id))?;
            println!("Active project is now [{}].", args.id);
            Ok(())
        }
        ProjectCommand::Remove(args) => {
            let removed = manager
                .remove_project(&args.id)
                .with_context(|| format!("Failed to remove project '{}'", args.id))?;
            println!("Removed project [{}] ({}).", removed.id, removed.path);
            Ok(())
        }
        ProjectCommand::Active(args) => match manager.active_project() {
            Some(project) => print_project(project, args.json),
            None => {
                println!("No active project.");
                Ok(())
            }
        },
        ProjectCommand::Attach(args) => {
            manager
                .add_instance_to_project(&args.project, &args.instance)
                .with_context(|| format!("Failed to attach instance '{}'", args.instance))?;
            println!(
                "Attached instance '{}' to project [{}].",
                args.instance, args.project
            );
            Ok(())
        }
        ProjectCommand::Detach(args) => {
            manager
                .remove_instance_from_project(&args.project, &args.instance)
                .with_context(|| format!("Failed to detach instance '{}'", args.instance))?;
            println!(
                "Detached instance '{}' from project [{}].",
                args.instance, args.project
            );
            Ok(())
        }
        ProjectCommand::Validate(args) => {
            manager.validate_project_path(&args.path)?;
            println!("{} is a valid project path.", args.path);
            Ok(())
        }
    }
}

fn add_project<S: ProjectStorage>(
    manager: &mut ProjectManager<S>,
    args: &ProjectAddArgs,
) -> Result<()> {
    let before = manager.project_count();
    let project = manager
        .add_project(&args.path, &args.name)
        .with_context(|| format!("Failed to add project at {}", args.path))?;
    manager
        .update_project_history(&project.path)
        .context("Failed to record project history")?;

    if manager.project_count() > before {
        println!("Added project [{}] at {}.", project.id, project.path);
    } else {
        println!("Reactivated project [{}] at {}.", project.id, project.path);
    }
    Ok(())
}

fn list_projects<S: ProjectStorage>(
    manager: &ProjectManager<S>,
    args: &ProjectListArgs,
) -> Result<()> {
    let projects = manager.list_projects();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }
    if projects.is_empty() {
        println!("No projects registered.");
        return Ok(());
    }
    for project in projects {
        println!("{}", format_project_row(project));
    }
    Ok(())
}

fn print_project(project: &Project, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(project)?);
        return Ok(());
    }
    println!("ID: {}", project.id);
    println!("Name: {}", project.display_name());
    println!("Path: {}", project.path);
    println!("Active: {}", project.active);
    println!("Last Accessed: {}", project.last_accessed.to_rfc3339());
    if !project.instances.is_empty() {
        println!("Instances: {}", project.instances.join(", "));
    }
    Ok(())
}

fn format_project_row(project: &Project) -> String {
    let marker = if project.active { "*" } else { " " };
    format!(
        "{marker} [{}] {} ({}) instances={}",
        project.id,
        project.display_name(),
        project.path,
        project.instances.len()
    )
}
