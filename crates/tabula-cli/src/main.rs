//! Tabula CLI - Command line interface for tabular control experiments
//!
//! Trains Monte Carlo, SARSA and SARSA(lambda) agents on Easy21 or the
//! gridworld, evaluates fixed policies and compares learned value functions.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use crate::config::{Config, LogFormat, LoggingConfig};
use commands::{compare, config as config_cmd, plan, simulate, train};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Tabula - tabular reinforcement learning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to TABULA_CONFIG, ./tabula.toml, ~/.config/tabula/tabula.toml)
    #[arg(short, long, global = true, env = "TABULA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a control agent
    Train(train::TrainArgs),

    /// Play games under a fixed policy and tally the outcomes
    Simulate(simulate::SimulateArgs),

    /// Compare SARSA(lambda) against a Monte Carlo reference on Easy21
    Compare(compare::CompareArgs),

    /// Solve the gridworld with dynamic programming
    Plan(plan::PlanArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tabula_cli={log_level},tabula_rl={log_level},tabula_env={log_level}").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = Config::find_config_file(cli.config.as_deref());
    let config = Config::load_from(source.as_deref())?;

    init_logging(&config.logging, cli.verbose);

    match &source {
        Some(path) => info!("Loaded config from: {:?}", path),
        None => info!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Train(args) => train::run(args, config),
        Commands::Simulate(args) => simulate::run(args, config),
        Commands::Compare(args) => compare::run(args, config),
        Commands::Plan(args) => plan::run(args, &config),
        Commands::Config(cmd) => config_cmd::run(cmd, &config, source.as_deref()),
    }
}
