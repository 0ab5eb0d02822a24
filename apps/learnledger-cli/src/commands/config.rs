use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use learnledger_core::config::{config_schema_json, write_schema_file};

use super::emit;

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print (or write) the JSON schema of the configuration file
    Schema {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(cmd: ConfigCmd, pretty: bool) -> Result<()> {
    match cmd {
        ConfigCmd::Schema { out: Some(path) } => {
            write_schema_file(&path)?;
            eprintln!("wrote {}", path.display());
            Ok(())
        }
        ConfigCmd::Schema { out: None } => emit(&config_schema_json()?, pretty),
    }
}
