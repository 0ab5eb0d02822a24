//! Turns catalog registrations into ranked learnuplet chains.
//!
//! A new algorithm gets one chain over all of its problem's train data,
//! starting at rank 0. New data gets a chain per algorithm of the problem,
//! starting from the algorithm's resolved lineage. Task writes are
//! best-effort: a failed write is logged and skipped, earlier writes stay.

use std::collections::HashSet;

use learnledger_store::RecordStore;

use crate::catalog::Catalog;
use crate::index::IndexedWriter;
use crate::lineage::Resolver;
use crate::model::{new_task_key, ItemKind, Learnuplet, Problem};

/// Splits sorted train data into mini-batches of `size`.
///
/// Exact multiples give equal batches. Fewer than `size` keys give a single
/// short batch. With exactly one full batch the remainder forms its own
/// batch; with two or more full batches it is folded into the last one.
pub fn plan_batches(keys: &[String], size: usize) -> Vec<Vec<String>> {
    if keys.is_empty() || size == 0 {
        return Vec::new();
    }
    let full = keys.len() / size;
    let rem = keys.len() % size;
    if full < 2 || rem == 0 {
        return keys.chunks(size).map(<[String]>::to_vec).collect();
    }
    let mut batches: Vec<Vec<String>> = keys[..(full - 1) * size]
        .chunks(size)
        .map(<[String]>::to_vec)
        .collect();
    batches.push(keys[(full - 1) * size..].to_vec());
    batches
}

struct Chain<'p> {
    problem_key: &'p str,
    problem: &'p Problem,
    algo_key: &'p str,
    start_model: &'p str,
    start_rank: i64,
}

pub struct Scheduler<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Scheduler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Schedules a freshly registered algorithm over every train data item of
    /// its problem. Only rank 0 starts from `start_model`.
    pub fn on_algorithm(&self, algo_key: &str, problem_key: &str, start_model: &str) -> usize {
        let Some(problem) = self.load_problem(problem_key) else {
            return 0;
        };
        let catalog = Catalog::new(self.store);
        let data = match catalog.problem_item_keys(ItemKind::Data, problem_key) {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(problem = %problem_key, %err, "cannot list problem data");
                return 0;
            }
        };
        let train = train_data(data, &problem);
        self.create_chain(
            Chain {
                problem_key,
                problem: &problem,
                algo_key,
                start_model,
                start_rank: 0,
            },
            &train,
        )
    }

    /// Schedules freshly registered data for every algorithm of its problem,
    /// continuing each algorithm's lineage.
    pub fn on_data(&self, data_key: &str, problem_key: &str) -> usize {
        let Some(problem) = self.load_problem(problem_key) else {
            return 0;
        };
        let train = train_data(vec![data_key.to_string()], &problem);
        if train.is_empty() {
            tracing::debug!(data = %data_key, "test data registered; nothing to schedule");
            return 0;
        }
        let algos = match Catalog::new(self.store).problem_item_keys(ItemKind::Algorithm, problem_key)
        {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(problem = %problem_key, %err, "cannot list problem algorithms");
                return 0;
            }
        };
        let resolver = Resolver::new(self.store);
        let mut created = 0;
        for algo_key in &algos {
            let lineage = resolver.resolve(algo_key);
            if lineage.is_unknown() {
                tracing::warn!(algo = %algo_key, data = %data_key, "lineage unknown; not scheduling");
                continue;
            }
            created += self.create_chain(
                Chain {
                    problem_key,
                    problem: &problem,
                    algo_key,
                    start_model: &lineage.model_address,
                    start_rank: lineage.next_rank(),
                },
                &train,
            );
        }
        created
    }

    fn load_problem(&self, problem_key: &str) -> Option<Problem> {
        match Catalog::new(self.store).problem(problem_key) {
            Ok(problem) if problem.train_batch_size > 0 => Some(problem),
            Ok(_) => {
                tracing::warn!(problem = %problem_key, "problem has no usable batch size");
                None
            }
            Err(err) => {
                tracing::warn!(problem = %problem_key, %err, "cannot read problem; nothing scheduled");
                None
            }
        }
    }

    fn create_chain(&self, chain: Chain<'_>, train: &[String]) -> usize {
        let writer = IndexedWriter::new(self.store);
        let mut created = 0;
        for (offset, batch) in plan_batches(train, chain.problem.train_batch_size)
            .into_iter()
            .enumerate()
        {
            let rank = chain.start_rank + offset as i64;
            let model_start = if offset == 0 { chain.start_model } else { "" };
            let task = Learnuplet::todo(
                chain.problem_key,
                chain.problem,
                chain.algo_key,
                model_start,
                batch,
                rank,
            );
            let key = new_task_key();
            match writer.insert_task(&key, &task) {
                Ok(()) => {
                    created += 1;
                    tracing::info!(task = %key, algo = %chain.algo_key, rank, "learnuplet created");
                }
                Err(err) => {
                    tracing::warn!(algo = %chain.algo_key, rank, %err, "learnuplet write skipped");
                }
            }
        }
        created
    }
}

/// Drops the problem's test data and sorts the rest bytewise.
fn train_data(mut keys: Vec<String>, problem: &Problem) -> Vec<String> {
    let test: HashSet<&str> = problem.test_data_keys.iter().map(String::as_str).collect();
    keys.retain(|k| !test.contains(k.as_str()));
    keys.sort();
    keys.dedup();
    keys
}
