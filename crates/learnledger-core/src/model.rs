use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, Result};

pub const PROBLEM_KEY_PREFIX: &str = "problem_";
pub const TASK_KEY_PREFIX: &str = "learnuplet_";

/// Lifecycle status of a learnuplet.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Pending,
    Done,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::Pending,
        TaskStatus::Done,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Some(TaskStatus::Todo),
            "pending" => Some(TaskStatus::Pending),
            "done" => Some(TaskStatus::Done),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::from_slug(s).ok_or_else(|| LedgerError::invalid(format!("unknown status {s:?}")))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemKind {
    #[serde(rename = "algo")]
    Algorithm,
    #[serde(rename = "data")]
    Data,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Algorithm => "algo",
            ItemKind::Data => "data",
        }
    }

    pub fn from_slug(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "algo" | "algorithm" => Some(ItemKind::Algorithm),
            "data" => Some(ItemKind::Data),
            _ => None,
        }
    }

    /// Name of the `(kind, problem) -> item` composite index.
    pub fn index_name(&self) -> &'static str {
        match self {
            ItemKind::Algorithm => "algo~problem~key",
            ItemKind::Data => "data~problem~key",
        }
    }

    /// Conventional key for an item stored at `address`, e.g. `algo_<address>`.
    pub fn key_for(&self, address: &str) -> String {
        format!("{}_{}", self.as_str(), address)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        ItemKind::from_slug(s).ok_or_else(|| LedgerError::invalid(format!("unknown item kind {s:?}")))
    }
}

/// A dataset with its evaluation split.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    pub storage_address: String,
    pub train_batch_size: usize,
    pub test_data_keys: Vec<String>,
}

/// An algorithm or a data sample attached to one problem.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub problem_key: String,
}

/// One training step of one algorithm: a mini-batch of train data, the
/// problem's test data and the model lineage around it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Learnuplet {
    pub problem_key: String,
    pub problem_address: String,
    pub algo_key: String,
    /// Empty until the previous rank's model is known.
    pub model_start_address: String,
    /// Empty until reported done.
    pub model_end_address: String,
    pub train_data_keys: Vec<String>,
    pub test_data_keys: Vec<String>,
    /// Empty until claimed.
    pub worker: String,
    pub status: TaskStatus,
    pub rank: i64,
    pub perf: f64,
    #[serde(default)]
    pub train_perf: BTreeMap<String, f64>,
    #[serde(default)]
    pub test_perf: BTreeMap<String, f64>,
}

impl Learnuplet {
    /// A fresh `Todo` task with no worker, end model or performance.
    pub fn todo(
        problem_key: &str,
        problem: &Problem,
        algo_key: &str,
        model_start_address: &str,
        train_data_keys: Vec<String>,
        rank: i64,
    ) -> Self {
        Self {
            problem_key: problem_key.to_string(),
            problem_address: problem.storage_address.clone(),
            algo_key: algo_key.to_string(),
            model_start_address: model_start_address.to_string(),
            model_end_address: String::new(),
            train_data_keys,
            test_data_keys: problem.test_data_keys.clone(),
            worker: String::new(),
            status: TaskStatus::Todo,
            rank,
            perf: 0.0,
            train_perf: BTreeMap::new(),
            test_perf: BTreeMap::new(),
        }
    }
}

/// A learnuplet together with its key, as returned by listings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub key: String,
    #[serde(flatten)]
    pub task: Learnuplet,
}

pub fn problem_key(external_id: &str) -> String {
    format!("{PROBLEM_KEY_PREFIX}{external_id}")
}

/// Task keys embed a time-ordered UUID so index scans roughly follow creation
/// order.
pub fn new_task_key() -> String {
    format!("{TASK_KEY_PREFIX}{}", Uuid::now_v7())
}

/// Rejects keys that cannot be stored as primary keys or index components.
pub fn validate_key(what: &str, key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LedgerError::invalid(format!("{what} key must not be empty")));
    }
    if key.contains('\u{0}') || key.contains(char::MAX) {
        return Err(LedgerError::invalid(format!(
            "{what} key {key:?} contains a reserved character"
        )));
    }
    Ok(())
}
