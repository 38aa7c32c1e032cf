//! tasklist CLI
//!
//! Command-line view over the tasklist sync store.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tasklist_core::{Config, HttpTaskService, SyncStore, TaskFilter};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "tasklist - Task list client with optimistic sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (overrides default and TASKLIST_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Task service URL (overrides base_url from config)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Which tasks to show (all, active, completed)
        #[arg(short, long, default_value_t = TaskFilter::All)]
        filter: TaskFilter,
    },
    /// Add a task
    #[command(alias = "create")]
    Add {
        /// Task text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Change the text of a task
    Edit {
        /// Task ID (full ID or prefix)
        id: String,
        /// New task text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Toggle a task between active and completed
    Toggle {
        /// Task ID (full ID or prefix)
        id: String,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete {
        /// Task ID (full ID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Mark every active task completed
    CompleteAll,
    /// Delete every completed task
    ClearCompleted {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List completed tasks as reported by the server
    Completed,
    /// Show active and completed counts
    Stats,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (base_url, timeout_secs, batch_policy, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work without a reachable service
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }

    init_logging(&config, cli.verbose);

    let service = HttpTaskService::from_config(&config)?;
    let store = SyncStore::new(service).with_batch_policy(config.batch_policy);
    debug!(
        "Using task service at {} ({})",
        store.service().base_url(),
        config.batch_policy
    );

    let command = cli.command.unwrap_or(Commands::List {
        filter: TaskFilter::All,
    });

    match command {
        Commands::List { filter } => commands::task::list(&store, filter, &output).await,
        Commands::Add { text } => commands::task::add(&store, text, &output).await,
        Commands::Edit { id, text } => commands::task::edit(&store, id, text, &output).await,
        Commands::Toggle { id } => commands::task::toggle(&store, id, &output).await,
        Commands::Delete { id, yes } => commands::task::delete(&store, id, yes, &output).await,
        Commands::CompleteAll => commands::task::complete_all(&store, &output).await,
        Commands::ClearCompleted { yes } => {
            commands::task::clear_completed(&store, yes, &output).await
        }
        Commands::Completed => commands::task::completed(&store, &output).await,
        Commands::Stats => commands::task::stats(&store, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// RUST_LOG takes precedence; otherwise the level follows -v. Logs go to
/// config.log_file when set, stderr otherwise.
fn init_logging(config: &Config, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let log_level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::new(format!(
            "tasklist_core={},tasklist_cli={}",
            log_level, log_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    match &config.log_file {
        Some(log_path) => match File::create(log_path) {
            Ok(file) => {
                // Ignore error if already initialized
                let _ = builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                let _ = builder.with_writer(std::io::stderr).try_init();
            }
        },
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
