use std::collections::BTreeMap;
use std::fmt;

use learnledger_store::{RecordStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::index::{load, IndexedWriter, Loaded};
use crate::model::{Learnuplet, TaskStatus};
use crate::perf::{parse_perf, parse_perf_map};

pub use learnledger_otel::AUDIT_TARGET;

/// Something a worker does to a learnuplet.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    Claim,
    ReportDone,
    ReportFailed,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::Claim => "claim",
            TaskEvent::ReportDone => "report done",
            TaskEvent::ReportFailed => "report failed",
        }
    }
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every accepted `(from, event) -> to` move. Anything absent is rejected.
const TRANSITIONS: &[(TaskStatus, TaskEvent, TaskStatus)] = &[
    (TaskStatus::Todo, TaskEvent::Claim, TaskStatus::Pending),
    (TaskStatus::Pending, TaskEvent::ReportDone, TaskStatus::Done),
    (TaskStatus::Pending, TaskEvent::ReportFailed, TaskStatus::Failed),
];

pub fn next_status(from: TaskStatus, event: TaskEvent) -> Option<TaskStatus> {
    TRANSITIONS
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
}

/// Outcome a worker reports for a claimed learnuplet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub status: TaskStatus,
    pub perf: f64,
    #[serde(default)]
    pub train_perf: BTreeMap<String, f64>,
    #[serde(default)]
    pub test_perf: BTreeMap<String, f64>,
    #[serde(default)]
    pub model_end: String,
}

impl TaskReport {
    pub fn done(
        perf: f64,
        train_perf: BTreeMap<String, f64>,
        test_perf: BTreeMap<String, f64>,
        model_end: impl Into<String>,
    ) -> Self {
        Self {
            status: TaskStatus::Done,
            perf,
            train_perf,
            test_perf,
            model_end: model_end.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TaskStatus::Failed,
            perf: 0.0,
            train_perf: BTreeMap::new(),
            test_perf: BTreeMap::new(),
            model_end: String::new(),
        }
    }

    /// Builds a report from raw worker strings. Maps use the
    /// `"<data key> <perf>, ..."` form; a failed report ignores them.
    pub fn parse(
        status: &str,
        perf: &str,
        train_perf: &str,
        test_perf: &str,
        model_end: &str,
    ) -> Result<Self> {
        match TaskStatus::from_slug(status) {
            Some(TaskStatus::Failed) => Ok(Self::failed()),
            Some(TaskStatus::Done) => Ok(Self::done(
                parse_perf(perf)?,
                parse_perf_map(train_perf)?,
                parse_perf_map(test_perf)?,
                model_end.trim(),
            )),
            _ => Err(LedgerError::invalid(format!(
                "report status must be done or failed, got {status:?}"
            ))),
        }
    }

    pub fn event(&self) -> Result<TaskEvent> {
        match self.status {
            TaskStatus::Done => Ok(TaskEvent::ReportDone),
            TaskStatus::Failed => Ok(TaskEvent::ReportFailed),
            other => Err(LedgerError::invalid(format!(
                "report status must be done or failed, got {other}"
            ))),
        }
    }
}

/// Claims and reports, each a guarded read-modify-write of one learnuplet.
pub struct Lifecycle<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Lifecycle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn claim(&self, key: &str, worker: &str) -> Result<Learnuplet> {
        let worker = worker.trim();
        if worker.is_empty() {
            return Err(LedgerError::invalid("worker must not be empty"));
        }
        self.apply(key, TaskEvent::Claim, |task| {
            task.worker = worker.to_string();
            Ok(())
        })
    }

    pub fn report(&self, key: &str, report: TaskReport) -> Result<Learnuplet> {
        let event = report.event()?;
        self.apply(key, event, |task| {
            if event == TaskEvent::ReportFailed {
                return Ok(());
            }
            // lineage treats a done frontier without a model as still open
            if report.model_end.trim().is_empty() {
                return Err(LedgerError::invalid("a done report needs the end model address"));
            }
            check_perf_keys("train", &report.train_perf, &task.train_data_keys)?;
            check_perf_keys("test", &report.test_perf, &task.test_data_keys)?;
            if !report.perf.is_finite() {
                return Err(LedgerError::invalid("performance must be finite"));
            }
            task.perf = report.perf;
            task.train_perf = report.train_perf;
            task.test_perf = report.test_perf;
            task.model_end_address = report.model_end;
            Ok(())
        })
    }

    fn apply<F>(&self, key: &str, event: TaskEvent, mutate: F) -> Result<Learnuplet>
    where
        F: FnOnce(&mut Learnuplet) -> Result<()>,
    {
        let Loaded { value, raw } = load::<_, Learnuplet>(self.store, "learnuplet", key)?;
        let from = value.status;
        let to = next_status(from, event).ok_or_else(|| LedgerError::InvalidTransition {
            key: key.to_string(),
            from,
            event,
        })?;
        let mut updated = value;
        updated.status = to;
        mutate(&mut updated)?;

        match IndexedWriter::new(self.store).update_task(key, raw, from, &updated) {
            Ok(()) => {}
            Err(LedgerError::Collaborator(StoreError::Conflict { .. })) => {
                let current = load::<_, Learnuplet>(self.store, "learnuplet", key)?.value.status;
                tracing::warn!(task = %key, %event, status = %current, "lost a concurrent update");
                return Err(LedgerError::InvalidTransition {
                    key: key.to_string(),
                    from: current,
                    event,
                });
            }
            Err(err) => return Err(err),
        }

        tracing::info!(
            target: AUDIT_TARGET,
            task = %key,
            algo = %updated.algo_key,
            rank = updated.rank,
            worker = %updated.worker,
            %from,
            %to,
            "learnuplet {}",
            event
        );
        Ok(updated)
    }
}

fn check_perf_keys(split: &str, perf: &BTreeMap<String, f64>, allowed: &[String]) -> Result<()> {
    for (data_key, value) in perf {
        if !allowed.iter().any(|k| k == data_key) {
            return Err(LedgerError::invalid(format!(
                "{split} performance for {data_key:?}, which is not {split} data of this task"
            )));
        }
        if !value.is_finite() {
            return Err(LedgerError::invalid(format!(
                "{split} performance for {data_key:?} is not finite"
            )));
        }
    }
    Ok(())
}
