use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Subcommand};
use learnledger_core::{Ledger, TaskRecord, TaskReport, TaskStatus};
use serde_json::json;

use super::emit;

#[derive(Subcommand)]
pub enum TaskCmd {
    /// Claim a todo learnuplet for a worker
    Claim {
        key: String,
        #[arg(long)]
        worker: String,
    },
    /// Report the outcome of a pending learnuplet
    Report(ReportArgs),
    /// Print one learnuplet
    Show { key: String },
    /// List learnuplets by status or by algorithm
    List(ListArgs),
}

#[derive(Args)]
pub struct ReportArgs {
    pub key: String,
    /// done | failed
    #[arg(long)]
    pub status: String,
    /// Overall performance; empty means 0
    #[arg(long, default_value = "")]
    pub perf: String,
    /// Per-sample train performance, "d0 0.5, d1 0.7"
    #[arg(long, default_value = "")]
    pub train_perf: String,
    /// Per-sample test performance, "t0 0.6"
    #[arg(long, default_value = "")]
    pub test_perf: String,
    /// Address of the trained model
    #[arg(long, default_value = "")]
    pub model: String,
}

#[derive(Args)]
#[command(group(ArgGroup::new("filter").required(true).args(["status", "algo"])))]
pub struct ListArgs {
    #[arg(long)]
    pub status: Option<TaskStatus>,
    #[arg(long)]
    pub algo: Option<String>,
}

#[derive(Args)]
pub struct LineageArgs {
    /// Algorithm key
    pub algo: String,
}

pub fn run(ledger: &Ledger, cmd: TaskCmd, pretty: bool) -> Result<()> {
    match cmd {
        TaskCmd::Claim { key, worker } => {
            let task = ledger
                .claim_task(&key, &worker)
                .with_context(|| format!("claim {key}"))?;
            emit(&TaskRecord { key, task }, pretty)
        }
        TaskCmd::Report(args) => {
            let report = TaskReport::parse(
                &args.status,
                &args.perf,
                &args.train_perf,
                &args.test_perf,
                &args.model,
            )?;
            let task = ledger
                .report_task(&args.key, report)
                .with_context(|| format!("report {}", args.key))?;
            emit(&TaskRecord { key: args.key, task }, pretty)
        }
        TaskCmd::Show { key } => {
            let task = ledger.get_task(&key)?;
            emit(&TaskRecord { key, task }, pretty)
        }
        TaskCmd::List(args) => {
            let tasks = match (args.status, args.algo) {
                (Some(status), _) => ledger.list_tasks_by_status(status)?,
                (None, Some(algo)) => ledger.list_tasks_by_algo(&algo)?,
                (None, None) => Vec::new(),
            };
            emit(&tasks, pretty)
        }
    }
}

pub fn run_lineage(ledger: &Ledger, args: LineageArgs, pretty: bool) -> Result<()> {
    let lineage = ledger.resolve_lineage(&args.algo);
    emit(
        &json!({
            "algo_key": args.algo,
            "rank": lineage.rank,
            "model_address": lineage.model_address,
            "next_rank": lineage.next_rank(),
        }),
        pretty,
    )
}
