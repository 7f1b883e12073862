//! SyncWarden CLI - runs the configured folder synchronization tasks.
//!
//! Besides the default run mode this tool creates the configuration file
//! and task descriptors interactively.

mod prompt;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use syncwarden_common::{OrchestratorConfig, CONFIG_FILENAME, LOG_DIR, TASKS_DIR};
use syncwarden_sync::{default_ssh_dir, Orchestrator, TaskSource};

use crate::prompt::{ask_config, ask_task, Prompter};

#[derive(Parser)]
#[command(name = "syncwarden")]
#[command(about = "SyncWarden - Remote folder backup and synchronization")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding the configuration, tasks and logs
    /// (default: directory of the executable).
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Create a new configuration file (same as `create-config`).
    #[arg(long = "createconfig", visible_alias = "create-config")]
    create_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all tasks (default).
    Run,

    /// Create the configuration file interactively.
    CreateConfig,

    /// Create the log and tasks directories and, if missing, the configuration.
    Init,

    /// Create a task descriptor interactively.
    CreateTask,

    /// Check the configuration and task descriptors without running them.
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => executable_dir()?,
    };

    let command = if cli.create_config {
        Commands::CreateConfig
    } else {
        cli.command.unwrap_or(Commands::Run)
    };

    match command {
        Commands::Run => cmd_run(&base_dir).await,
        Commands::CreateConfig => cmd_create_config(&base_dir),
        Commands::Init => cmd_init(&base_dir),
        Commands::CreateTask => cmd_create_task(&base_dir),
        Commands::Validate => cmd_validate(&base_dir),
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate executable")?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn stdin_prompter() -> Prompter<io::StdinLock<'static>, io::Stdout> {
    Prompter::new(io::stdin().lock(), io::stdout())
}

/// Load configuration and run every task.
async fn cmd_run(base_dir: &Path) -> Result<()> {
    let config_path = base_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        println!(
            "Configuration file '{}' not found. Run with the create-config command to create it.",
            config_path.display()
        );
        return Ok(());
    }

    let config = OrchestratorConfig::load(&config_path).context("Failed to load configuration")?;
    info!("Using configuration {}", config_path.display());

    let orchestrator = Orchestrator::new(config, base_dir)
        .await
        .context("Failed to prepare run")?;
    let summary = orchestrator.run().await.context("Failed to load tasks")?;

    println!(
        "Finished {} task(s): {} succeeded, {} failed.",
        summary.results.len(),
        summary.succeeded(),
        summary.failed()
    );
    for result in summary.results.iter().filter(|r| !r.success) {
        println!(
            "  {} failed after {} attempt(s): {}",
            result.task_id,
            result.attempts,
            result.last_error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Create the configuration file from prompts.
fn cmd_create_config(base_dir: &Path) -> Result<()> {
    let config = ask_config(&mut stdin_prompter())?;
    let path = base_dir.join(CONFIG_FILENAME);
    config
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Configuration file created: {}", path.display());
    Ok(())
}

/// Prepare the directory layout.
fn cmd_init(base_dir: &Path) -> Result<()> {
    for dir in [LOG_DIR, TASKS_DIR] {
        let path = base_dir.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    println!("Created directories '{}' and '{}'", LOG_DIR, TASKS_DIR);

    if base_dir.join(CONFIG_FILENAME).exists() {
        println!("Configuration file already exists, keeping it.");
        Ok(())
    } else {
        cmd_create_config(base_dir)
    }
}

/// Create a task descriptor from prompts.
fn cmd_create_task(base_dir: &Path) -> Result<()> {
    let (name, task) = ask_task(&mut stdin_prompter())?;

    if let Some(local) = task.local_folder_path.as_deref().filter(|p| !p.is_empty()) {
        std::fs::create_dir_all(local)
            .with_context(|| format!("Failed to create local folder {}", local))?;
    }

    let source = TaskSource::with_home_keys(base_dir.join(TASKS_DIR))?;
    let path = source.write_task(&name, &task)?;

    println!("The task file has been created as '{}'.", path.display());
    if let Some(key) = task.private_key_name.as_deref() {
        let key_path = default_ssh_dir()?.join(key);
        if !key_path.exists() {
            println!(
                "No key found at {}. Provision it with ssh-keygen and ssh-copy-id before the next run.",
                key_path.display()
            );
        }
    }
    Ok(())
}

/// Report problems in the configuration and task files.
fn cmd_validate(base_dir: &Path) -> Result<()> {
    let config_path = base_dir.join(CONFIG_FILENAME);
    let config = OrchestratorConfig::load(&config_path).context("Invalid configuration")?;
    println!(
        "Configuration OK: {} worker(s), {} attempt(s), {}s backoff",
        config.num_threads, config.max_attempts, config.backoff_seconds
    );

    let source = TaskSource::with_home_keys(base_dir.join(TASKS_DIR))?;
    let tasks = source.load().context("Failed to load tasks")?;
    let mut problems = 0;
    for task in &tasks {
        if let Err(e) = task.validate() {
            problems += 1;
            println!("  {}: {}", task.id, e);
        } else if !task.credential_path.exists() {
            println!("  {}: key {} not found", task.id, task.credential_path.display());
        } else {
            println!("  {}: OK", task.id);
        }
    }

    println!("{} task(s) checked, {} invalid.", tasks.len(), problems);
    Ok(())
}
