use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use learnledger_core::{ItemKind, Ledger};
use serde_json::json;

use super::emit;

#[derive(Subcommand)]
pub enum ProblemCmd {
    /// Register a problem and its test data
    Register(ProblemRegisterArgs),
    /// Print one problem
    Show {
        /// Problem key, e.g. problem_p1
        key: String,
    },
    /// Print every problem
    List,
}

#[derive(Args)]
pub struct ProblemRegisterArgs {
    /// External id; the problem is stored as problem_<id>
    #[arg(long)]
    pub id: String,
    /// Storage address of the problem workflow
    #[arg(long)]
    pub address: String,
    /// Train data keys per learnuplet
    #[arg(long)]
    pub batch_size: usize,
    /// Test data key (repeatable, or comma separated)
    #[arg(long = "test-data", value_delimiter = ',')]
    pub test_data: Vec<String>,
}

#[derive(Subcommand)]
pub enum AlgoCmd {
    /// Register an algorithm and schedule it over the problem's train data
    Register {
        #[arg(long)]
        key: String,
        #[arg(long)]
        problem: String,
        /// Model address the first learnuplet starts from
        #[arg(long, default_value = "")]
        model: String,
    },
}

#[derive(Subcommand)]
pub enum DataCmd {
    /// Register a data item and extend every algorithm of its problem
    Register {
        #[arg(long)]
        key: String,
        #[arg(long)]
        problem: String,
    },
}

#[derive(Subcommand)]
pub enum ItemsCmd {
    /// Every item of one kind
    List {
        /// algo | data
        #[arg(long)]
        kind: ItemKind,
    },
    /// Item keys of one kind attached to a problem
    Problem {
        #[arg(long)]
        kind: ItemKind,
        #[arg(long)]
        problem: String,
    },
}

pub fn run_problem(ledger: &Ledger, cmd: ProblemCmd, pretty: bool) -> Result<()> {
    match cmd {
        ProblemCmd::Register(args) => {
            let key = ledger
                .register_problem(&args.id, &args.address, args.batch_size, &args.test_data)
                .with_context(|| format!("register problem {}", args.id))?;
            emit(&json!({ "problem_key": key }), pretty)
        }
        ProblemCmd::Show { key } => {
            let problem = ledger.get_problem(&key)?;
            emit(&problem, pretty)
        }
        ProblemCmd::List => {
            let problems: Vec<_> = ledger
                .list_problems()?
                .into_iter()
                .map(|(key, problem)| json!({ "key": key, "problem": problem }))
                .collect();
            emit(&problems, pretty)
        }
    }
}

pub fn run_algo(ledger: &Ledger, cmd: AlgoCmd, pretty: bool) -> Result<()> {
    match cmd {
        AlgoCmd::Register {
            key,
            problem,
            model,
        } => {
            let created = ledger
                .register_algorithm_with_model(&key, &problem, &model)
                .with_context(|| format!("register algorithm {key}"))?;
            emit(&json!({ "algo_key": key, "created": created }), pretty)
        }
    }
}

pub fn run_data(ledger: &Ledger, cmd: DataCmd, pretty: bool) -> Result<()> {
    match cmd {
        DataCmd::Register { key, problem } => {
            let created = ledger
                .register_data(&key, &problem)
                .with_context(|| format!("register data {key}"))?;
            emit(&json!({ "data_key": key, "created": created }), pretty)
        }
    }
}

pub fn run_items(ledger: &Ledger, cmd: ItemsCmd, pretty: bool) -> Result<()> {
    match cmd {
        ItemsCmd::List { kind } => {
            let items: Vec<_> = ledger
                .list_items(kind)?
                .into_iter()
                .map(|(key, item)| json!({ "key": key, "kind": item.kind, "problem_key": item.problem_key }))
                .collect();
            emit(&items, pretty)
        }
        ItemsCmd::Problem { kind, problem } => {
            let keys = ledger.list_problem_items(kind, &problem)?;
            emit(&keys, pretty)
        }
    }
}
