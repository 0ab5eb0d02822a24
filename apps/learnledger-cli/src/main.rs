use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learnledger_core::config::{load_config, Config, StoreBackend};
use learnledger_core::Ledger;

mod commands;

use commands::{AlgoCmd, ConfigCmd, DataCmd, ItemsCmd, LineageArgs, ProblemCmd, TaskCmd};

#[derive(Parser)]
#[command(name = "learnledger", version, about = "Learnuplet scheduling ledger")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "LEARNLEDGER_CONFIG")]
    config: Option<PathBuf>,
    /// SQLite database file; overrides the configured store
    #[arg(long, global = true, env = "LEARNLEDGER_DB")]
    db: Option<PathBuf>,
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Problem registration and lookup
    Problem {
        #[command(subcommand)]
        cmd: ProblemCmd,
    },
    /// Algorithm registration (schedules training)
    Algo {
        #[command(subcommand)]
        cmd: AlgoCmd,
    },
    /// Data registration (extends every algorithm's chain)
    Data {
        #[command(subcommand)]
        cmd: DataCmd,
    },
    /// Catalog listings
    Items {
        #[command(subcommand)]
        cmd: ItemsCmd,
    },
    /// Learnuplet claims, reports and listings
    Task {
        #[command(subcommand)]
        cmd: TaskCmd,
    },
    /// Resolve an algorithm's rank frontier and best model
    Lineage(LineageArgs),
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        cfg.store.backend = Some(StoreBackend::Sqlite);
        cfg.store.path = Some(db.display().to_string());
    }
    learnledger_otel::init_with_filter(cfg.logging.filter.as_deref().unwrap_or("info"));

    let pretty = cli.pretty;
    if let Commands::Config { cmd } = cli.command {
        return commands::config::run(cmd, pretty);
    }

    let store = cfg.open_store().context("open record store")?;
    tracing::debug!(backend = ?cfg.backend(), path = %cfg.db_path(), "ledger opened");
    let ledger = Ledger::new(store);
    match cli.command {
        Commands::Problem { cmd } => commands::catalog::run_problem(&ledger, cmd, pretty),
        Commands::Algo { cmd } => commands::catalog::run_algo(&ledger, cmd, pretty),
        Commands::Data { cmd } => commands::catalog::run_data(&ledger, cmd, pretty),
        Commands::Items { cmd } => commands::catalog::run_items(&ledger, cmd, pretty),
        Commands::Task { cmd } => commands::task::run(&ledger, cmd, pretty),
        Commands::Lineage(args) => commands::task::run_lineage(&ledger, args, pretty),
        Commands::Config { .. } => Ok(()),
    }
}
