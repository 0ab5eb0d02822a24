use anyhow::Result;
use serde::Serialize;

pub mod catalog;
pub mod config;
pub mod task;

pub use catalog::{AlgoCmd, DataCmd, ItemsCmd, ProblemCmd};
pub use config::ConfigCmd;
pub use task::{LineageArgs, TaskCmd};

/// Writes `value` as one JSON document on stdout.
pub fn emit<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
