// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Scholar CLI
//!
//! The `scholar` binary is the operator surface over the learning core.
//!
//! ## Commands
//!
//! - `scholar config show|validate|generate` - Configuration management
//! - `scholar update [--dry-run]` - Apply database migrations
//! - `scholar tree import|show|delete` - Module tree operations
//! - `scholar record tutoring|assignment` - Feed a mastery signal by hand
//! - `scholar profile show` - Print a learning profile summary
//! - `scholar replay <FILE>` - Run a scenario against in-memory stores
//!
//! Commands other than `replay` use the configured storage backend. With the
//! default in-memory backend nothing outlives the process.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use scholar::commands::{self, ConfigCommand, ProfileCommand, RecordCommand, TreeCommand};
use scholar_core::domain::config::{LoggingConfig, ScholarConfigManifest};

/// Scholar - module trees, mastery propagation and learning profiles
#[derive(Parser)]
#[command(name = "scholar")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "SCHOLAR_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, env = "SCHOLAR_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the scholar database schema
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: commands::UpdateCommand,
    },

    /// Module tree operations
    #[command(name = "tree")]
    Tree {
        #[command(subcommand)]
        command: TreeCommand,
    },

    /// Record a mastery signal
    #[command(name = "record")]
    Record {
        #[command(subcommand)]
        command: RecordCommand,
    },

    /// Learning profiles
    #[command(name = "profile")]
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Replay a scenario file against in-memory stores
    #[command(name = "replay")]
    Replay {
        #[command(flatten)]
        command: commands::ReplayCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // A broken config file must not prevent `config validate` from reporting it.
    let logging = ScholarConfigManifest::load_or_default(cli.config.clone())
        .map(|c| c.logging())
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref(), &logging)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Update { command }) => commands::update::execute(command, cli.config).await,
        Some(Commands::Tree { command }) => commands::tree::handle_command(command, cli.config).await,
        Some(Commands::Record { command }) => commands::record::handle_command(command, cli.config).await,
        Some(Commands::Profile { command }) => commands::profile::handle_command(command, cli.config).await,
        Some(Commands::Replay { command }) => commands::replay::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level_override: Option<&str>, config: &LoggingConfig) -> Result<()> {
    let level = level_override.unwrap_or(&config.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
