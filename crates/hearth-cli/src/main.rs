//! Hearth CLI - Command-line interface for household lists
//!
//! Provides commands for:
//! - Browsing, creating and deleting lists
//! - Adding, toggling and removing entries
//! - Showing the urgent task view across task lists
//! - Following a list as it changes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hearth_core::config::Config;

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand,
    items::{AddCommand, RemoveCommand, ShowCommand, TaskCommand, ToggleCommand},
    lists::{CreateListCommand, DeleteListCommand, ListsCommand},
    urgent::UrgentCommand,
    watch::WatchCommand,
};
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "hearth", version, about = "Shared household shopping, task and voucher lists")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the household's lists
    Lists(ListsCommand),
    /// Create a list
    CreateList(CreateListCommand),
    /// Delete a list and all of its entries
    DeleteList(DeleteListCommand),
    /// Show the entries of a list
    Show(ShowCommand),
    /// Add an entry to a shopping or voucher list
    Add(AddCommand),
    /// Add a task to a task list
    Task(TaskCommand),
    /// Toggle an entry between open and done
    Toggle(ToggleCommand),
    /// Remove an entry
    Remove(RemoveCommand),
    /// Show urgent tasks from every task list
    Urgent(UrgentCommand),
    /// Follow a list until interrupted
    Watch(WatchCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn load_config(explicit: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok((config, path.clone()))
        }
        None => {
            let path = Config::default_path();
            Ok((Config::load_or_default(&path), path))
        }
    }
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so --json output on stdout stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.log_json || config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_ref())?;
    init_tracing(&cli, &config);

    let ctx = AppContext {
        config,
        config_path,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
    };

    match &cli.command {
        Commands::Lists(cmd) => cmd.execute(&ctx).await,
        Commands::CreateList(cmd) => cmd.execute(&ctx).await,
        Commands::DeleteList(cmd) => cmd.execute(&ctx).await,
        Commands::Show(cmd) => cmd.execute(&ctx).await,
        Commands::Add(cmd) => cmd.execute(&ctx).await,
        Commands::Task(cmd) => cmd.execute(&ctx).await,
        Commands::Toggle(cmd) => cmd.execute(&ctx).await,
        Commands::Remove(cmd) => cmd.execute(&ctx).await,
        Commands::Urgent(cmd) => cmd.execute(&ctx).await,
        Commands::Watch(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
