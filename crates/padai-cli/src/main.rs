//! PadAI CLI - coordinate agents over a beads issue file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use padai_core::config::CONFIG_FILE;
use padai_core::{EngineConfig, Error, Status, Task, TaskView};
use padai_engine::Engine;
use padai_storage::JsonlStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "padai", version)]
#[command(about = "PadAI - dependency-aware task coordination for agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the issues.jsonl store (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Path to a config file (defaults to .padai/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Refuse to load a graph with dangling edges or self-loops
    #[arg(long, global = true)]
    strict: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .padai/config.toml
    Init {
        /// Path to initialize (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// List tasks ready to be claimed
    Ready,

    /// List all tasks with their effective status
    List {
        /// Filter by effective status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,
    },

    /// Show incomplete tasks blocking a task
    Blocking {
        /// Task ID
        id: String,
    },

    /// Show the full transitive dependency closure of a task
    Deps {
        /// Task ID
        id: String,
    },

    /// Claim the next ready task for an agent
    Claim {
        /// Agent name
        agent: String,

        /// Claim this task instead of the next ready one
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Mark an in-progress task completed
    Complete {
        /// Task ID
        id: String,

        /// Completion notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Release an in-progress task
    Abandon {
        /// Task ID
        id: String,

        /// Why the task was released
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Show task counts by status
    Status,
}

/// Find the workspace root by walking up to a directory holding `.beads` or
/// `.padai`. Falls back to the current directory.
fn find_workspace_root() -> Result<PathBuf> {
    let start = env::current_dir()?;
    let mut current = start.clone();

    loop {
        if current.join(".beads").is_dir() || current.join(".padai").is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Ok(start),
        }
    }
}

fn load_config(cli: &Cli, root: &Path) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load_or_default(root)?,
    };

    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    if cli.strict {
        config.strict_graph = true;
    }
    config.validate()?;
    Ok(config)
}

async fn open_engine(cli: &Cli) -> Result<Engine> {
    let root = find_workspace_root()?;
    let config = load_config(cli, &root)?;
    let store_path = config.resolved_store_path(&root);
    debug!("Using store {}", store_path.display());

    let store = Arc::new(JsonlStore::new(store_path));
    Engine::open(store, config)
        .await
        .context("Failed to load task graph")
}

fn colored_status(status: Status) -> ColoredString {
    let s = status.as_str();
    match status {
        Status::Open => s.normal(),
        Status::Ready => s.green(),
        Status::InProgress => s.yellow(),
        Status::Completed => s.bright_black(),
        Status::Blocked => s.red(),
    }
}

fn colored_priority(priority: i32) -> ColoredString {
    let priority_str = format!("P{}", priority);
    match priority {
        0 => priority_str.red().bold(),
        1 => priority_str.yellow(),
        2 => priority_str.normal(),
        _ => priority_str.bright_black(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_header() {
    println!(
        "{:<14} {:<12} {:<8} {}",
        "ID".bold(),
        "STATUS".bold(),
        "PRIORITY".bold(),
        "TITLE".bold()
    );
    println!("{}", "─".repeat(80));
}

fn print_row(id: &str, status: Status, task: &Task) {
    println!(
        "{:<14} {:<12} {:<8} {}",
        id.bright_cyan(),
        colored_status(status),
        colored_priority(task.priority),
        task.title
    );
}

fn print_ids(title: &str, ids: &BTreeSet<String>) {
    if ids.is_empty() {
        println!("{}", format!("{}: none", title).green());
        return;
    }
    println!("{}", format!("{}:", title).bold());
    for id in ids {
        println!("  {}", id.bright_cyan());
    }
}

fn print_view(view: &TaskView) {
    let task = &view.task;
    println!("{}", "━".repeat(80));
    println!("{} {}", "Task:".bold(), task.id.bright_cyan());
    println!("{}", "━".repeat(80));
    println!();
    println!("{:<15} {}", "Title:".bold(), task.title);
    println!("{:<15} {}", "Type:".bold(), task.issue_type);
    println!("{:<15} {}", "Status:".bold(), colored_status(view.effective_status));
    println!("{:<15} {}", "Priority:".bold(), colored_priority(task.priority));

    if let Some(assignee) = &task.assignee {
        println!("{:<15} {}", "Assignee:".bold(), assignee);
    }

    if !task.labels.is_empty() {
        let labels: Vec<&str> = task.labels.iter().map(String::as_str).collect();
        println!("{:<15} {}", "Labels:".bold(), labels.join(", "));
    }

    println!("{:<15} {}", "Created:".bold(), task.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("{:<15} {}", "Updated:".bold(), task.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if !view.dependencies.is_empty() {
        println!();
        println!("{}", "Dependencies:".bold());
        for dep in &view.dependencies {
            println!("  {} ({})", dep.depends_on_id.bright_cyan(), dep.dep_type);
        }
    }

    if !view.blocked_by.is_empty() {
        let blockers: Vec<&str> = view.blocked_by.iter().map(String::as_str).collect();
        println!("{:<15} {}", "Blocked by:".bold(), blockers.join(", ").red());
    }

    if !task.description.is_empty() {
        println!();
        println!("{}", "Description:".bold());
        println!("{}", task.description);
    }

    if let Some(notes) = &task.notes {
        println!();
        println!("{}", "Notes:".bold());
        println!("{}", notes);
    }

    println!();
    println!("{}", "━".repeat(80));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("PadAI CLI starting");

    if let Commands::Init { path } = &cli.command {
        let root = path.clone().unwrap_or_else(|| PathBuf::from("."));
        EngineConfig::write_default(&root)?;
        println!("{}", "✓ Initialized PadAI workspace".green().bold());
        println!("  Config: {}", root.join(CONFIG_FILE).display());
        return Ok(());
    }

    let engine = open_engine(&cli).await?;

    match &cli.command {
        Commands::Init { .. } => Ok(()),

        Commands::Ready => {
            let ready = engine.list_ready();
            if cli.json {
                return print_json(&ready);
            }
            if ready.is_empty() {
                println!("{}", "No ready tasks".yellow());
                return Ok(());
            }
            print_header();
            for task in &ready {
                print_row(&task.id, task.normalized_status(), task);
            }
            Ok(())
        }

        Commands::List { status } => {
            let filter = status.as_deref().map(Status::normalize);
            let views: Vec<TaskView> = engine
                .list_all()
                .into_iter()
                .filter(|v| filter.map_or(true, |s| v.effective_status == s))
                .collect();
            if cli.json {
                return print_json(&views);
            }
            if views.is_empty() {
                println!("{}", "No tasks found".yellow());
                return Ok(());
            }
            print_header();
            for view in &views {
                print_row(&view.task.id, view.effective_status, &view.task);
            }
            Ok(())
        }

        Commands::Show { id } => {
            let view = engine.get(id)?;
            if cli.json {
                return print_json(&view);
            }
            print_view(&view);
            Ok(())
        }

        Commands::Blocking { id } => {
            // Unknown ids are reported, not treated as unblocked.
            engine.get(id)?;
            let blocking = engine.get_blocking(id);
            if cli.json {
                return print_json(&blocking);
            }
            print_ids(&format!("Blocking {}", id), &blocking);
            Ok(())
        }

        Commands::Deps { id } => {
            engine.get(id)?;
            let deps = engine.transitive_deps(id);
            if cli.json {
                return print_json(&deps);
            }
            print_ids(&format!("Dependencies of {}", id), &deps);
            Ok(())
        }

        Commands::Claim { agent, task } => {
            let result = match task {
                Some(task_id) => engine.claim_task(task_id, agent).await,
                None => engine.claim(agent).await,
            };

            match result {
                Ok(task) => {
                    if cli.json {
                        return print_json(&task);
                    }
                    println!("{}", format!("✓ Claimed task {}", task.id).green().bold());
                    println!("  Title:    {}", task.title);
                    println!("  Assignee: {}", agent);
                    Ok(())
                }
                Err(Error::NoTasksAvailable) => {
                    if cli.json {
                        return print_json(&serde_json::Value::Null);
                    }
                    println!("{}", "No ready tasks available".yellow());
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Complete { id, notes } => {
            let task = engine.complete(id, notes.as_deref()).await?;
            if cli.json {
                return print_json(&task);
            }
            println!("{}", format!("✓ Completed task {}", task.id).green().bold());
            println!("  Title: {}", task.title);

            let snapshot = engine.snapshot();
            let unblocked: Vec<String> = snapshot
                .transitive_dependents(id)
                .into_iter()
                .filter(|dependent| snapshot.is_ready(dependent))
                .collect();
            if !unblocked.is_empty() {
                println!("  Now ready: {}", unblocked.join(", ").bright_green());
            }
            Ok(())
        }

        Commands::Abandon { id, reason } => {
            let task = engine.abandon(id, reason.as_deref()).await?;
            if cli.json {
                return print_json(&task);
            }
            println!("{}", format!("✓ Released task {}", task.id).green().bold());
            println!("  Status: {}", colored_status(task.normalized_status()));
            Ok(())
        }

        Commands::Status => {
            let summary = engine.status();
            if cli.json {
                return print_json(&summary);
            }
            println!("{}", "Task status".bold());
            println!("  Total:       {}", summary.total);
            println!("  Open:        {}", summary.open);
            println!("  Ready:       {}", summary.ready.to_string().bright_green());
            println!("  In progress: {}", summary.in_progress.to_string().yellow());
            println!("  Completed:   {}", summary.completed.to_string().bright_black());
            println!("  Blocked:     {}", summary.blocked.to_string().red());
            Ok(())
        }
    }
}
