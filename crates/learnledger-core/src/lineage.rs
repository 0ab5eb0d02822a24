//! Reconstructs an algorithm's rank frontier and best model from its task
//! history. Nothing here is cached: every answer is a fresh fold over the
//! `learnuplet~algo~key` index.

use learnledger_store::RecordStore;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::index::{decode, TASK_ALGO_INDEX, TASK_DOC};
use crate::model::{Learnuplet, TaskStatus};

/// Frontier rank and model address of one algorithm.
///
/// `rank == -1` means the history could not be read and nothing should be
/// scheduled for the algorithm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub rank: i64,
    pub model_address: String,
}

impl Lineage {
    pub fn unknown() -> Self {
        Self {
            rank: -1,
            model_address: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.rank < 0
    }

    /// The frontier task has completed and its model is resolved.
    pub fn frontier_complete(&self) -> bool {
        !self.is_unknown() && !self.model_address.is_empty()
    }

    /// First rank for newly scheduled work: past a complete frontier, or
    /// alongside one that is still in flight.
    pub fn next_rank(&self) -> i64 {
        if self.frontier_complete() {
            self.rank + 1
        } else {
            self.rank.max(0)
        }
    }
}

/// Running state of the lineage fold. Results depend on visiting order when
/// several done tasks tie on performance or when a lower rank is seen after
/// a higher one.
#[derive(Debug, Default)]
pub struct LineageFold {
    rank: i64,
    model_address: String,
    best_perf: Option<f64>,
}

impl LineageFold {
    pub fn observe(mut self, task: &Learnuplet) -> Self {
        let done = task.status == TaskStatus::Done;
        if done && self.best_perf.is_none_or(|best| task.perf >= best) {
            self.best_perf = Some(task.perf);
            self.model_address = task.model_end_address.clone();
        }
        if task.rank >= self.rank {
            self.rank = task.rank;
            if !done {
                self.model_address.clear();
            }
        }
        self
    }

    pub fn finish(self) -> Lineage {
        Lineage {
            rank: self.rank,
            model_address: self.model_address,
        }
    }
}

pub fn fold_lineage<'t, I>(tasks: I) -> Lineage
where
    I: IntoIterator<Item = &'t Learnuplet>,
{
    tasks
        .into_iter()
        .fold(LineageFold::default(), LineageFold::observe)
        .finish()
}

pub struct Resolver<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Folds every task of `algo_key`; any read failure along the way yields
    /// [`Lineage::unknown`] rather than a partial answer.
    pub fn resolve(&self, algo_key: &str) -> Lineage {
        match self.try_resolve(algo_key) {
            Ok(lineage) => {
                tracing::debug!(
                    algo = %algo_key,
                    rank = lineage.rank,
                    model = %lineage.model_address,
                    "lineage resolved"
                );
                lineage
            }
            Err(err) => {
                tracing::warn!(algo = %algo_key, %err, "lineage unknown");
                Lineage::unknown()
            }
        }
    }

    fn try_resolve(&self, algo_key: &str) -> Result<Lineage> {
        let entries = self
            .store
            .scan_composite_prefix(TASK_ALGO_INDEX, &[TASK_DOC, algo_key])?;
        let mut tasks = entries.map(|entry| -> Result<Learnuplet> {
            let entry = entry?;
            let task_key = entry
                .last()
                .ok_or_else(|| LedgerError::invalid("algo index entry without task key"))?;
            let raw = self
                .store
                .get(task_key)?
                .ok_or_else(|| LedgerError::not_found("learnuplet", task_key))?;
            decode(task_key, &raw)
        });
        let fold = tasks.try_fold(LineageFold::default(), |acc, task| {
            task.map(|t| acc.observe(&t))
        })?;
        Ok(fold.finish())
    }
}
