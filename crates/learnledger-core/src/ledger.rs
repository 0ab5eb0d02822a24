use std::sync::Arc;

use learnledger_store::RecordStore;

use crate::catalog::Catalog;
use crate::error::{LedgerError, Result};
use crate::index::{decode, indexed_keys, load, TASK_ALGO_INDEX, TASK_DOC, TASK_STATUS_INDEX};
use crate::lifecycle::{Lifecycle, TaskReport};
use crate::lineage::{Lineage, Resolver};
use crate::model::{validate_key, Item, ItemKind, Learnuplet, Problem, TaskRecord, TaskStatus};
use crate::scheduler::Scheduler;

/// Entry point for callers: catalog registration, scheduling triggers,
/// lifecycle transitions and index-backed listings over one record store.
///
/// Cheap to clone; clones share the store.
pub struct Ledger<S: RecordStore + ?Sized = dyn RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore + ?Sized> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register_problem(
        &self,
        external_id: &str,
        storage_address: &str,
        train_batch_size: usize,
        test_data_keys: &[String],
    ) -> Result<String> {
        Catalog::new(&*self.store).register_problem(
            external_id,
            storage_address,
            train_batch_size,
            test_data_keys,
        )
    }

    /// Stores the algorithm and schedules it over the problem's train data.
    /// Returns the number of learnuplets created.
    pub fn register_algorithm(&self, algo_key: &str, problem_key: &str) -> Result<usize> {
        self.register_algorithm_with_model(algo_key, problem_key, "")
    }

    pub fn register_algorithm_with_model(
        &self,
        algo_key: &str,
        problem_key: &str,
        start_model: &str,
    ) -> Result<usize> {
        Catalog::new(&*self.store).store_item(algo_key, ItemKind::Algorithm, problem_key)?;
        tracing::info!(algo = %algo_key, problem = %problem_key, "algorithm registered");
        Ok(Scheduler::new(&*self.store).on_algorithm(algo_key, problem_key, start_model))
    }

    /// Stores the data item and extends every algorithm of its problem.
    /// Returns the number of learnuplets created.
    pub fn register_data(&self, data_key: &str, problem_key: &str) -> Result<usize> {
        Catalog::new(&*self.store).store_item(data_key, ItemKind::Data, problem_key)?;
        tracing::info!(data = %data_key, problem = %problem_key, "data registered");
        Ok(Scheduler::new(&*self.store).on_data(data_key, problem_key))
    }

    pub fn claim_task(&self, task_key: &str, worker: &str) -> Result<Learnuplet> {
        Lifecycle::new(&*self.store).claim(task_key, worker)
    }

    pub fn report_task(&self, task_key: &str, report: TaskReport) -> Result<Learnuplet> {
        Lifecycle::new(&*self.store).report(task_key, report)
    }

    pub fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        let keys = indexed_keys(&*self.store, TASK_STATUS_INDEX, &[TASK_DOC, status.as_str()])?;
        self.fetch_tasks(keys)
    }

    pub fn list_tasks_by_algo(&self, algo_key: &str) -> Result<Vec<TaskRecord>> {
        validate_key("algo", algo_key)?;
        let keys = indexed_keys(&*self.store, TASK_ALGO_INDEX, &[TASK_DOC, algo_key])?;
        self.fetch_tasks(keys)
    }

    pub fn resolve_lineage(&self, algo_key: &str) -> Lineage {
        Resolver::new(&*self.store).resolve(algo_key)
    }

    pub fn get_problem(&self, problem_key: &str) -> Result<Problem> {
        Catalog::new(&*self.store).problem(problem_key)
    }

    pub fn list_problems(&self) -> Result<Vec<(String, Problem)>> {
        Catalog::new(&*self.store).list_problems()
    }

    pub fn get_item(&self, key: &str) -> Result<Item> {
        Catalog::new(&*self.store).item(key)
    }

    pub fn get_task(&self, task_key: &str) -> Result<Learnuplet> {
        Ok(load::<_, Learnuplet>(&*self.store, "learnuplet", task_key)?.value)
    }

    pub fn list_items(&self, kind: ItemKind) -> Result<Vec<(String, Item)>> {
        Catalog::new(&*self.store).list_items(kind)
    }

    pub fn list_problem_items(&self, kind: ItemKind, problem_key: &str) -> Result<Vec<String>> {
        Catalog::new(&*self.store).problem_item_keys(kind, problem_key)
    }

    fn fetch_tasks(&self, keys: Vec<String>) -> Result<Vec<TaskRecord>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key)? {
                Some(raw) => {
                    let task = decode(&key, &raw)?;
                    out.push(TaskRecord { key, task });
                }
                None => tracing::warn!(task = %key, "index entry without a record skipped"),
            }
        }
        Ok(out)
    }
}

impl<S: RecordStore + ?Sized + 'static> Ledger<S> {
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Ledger<S>) -> Result<T> + Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(ledger))
            .await
            .map_err(|e| LedgerError::Join(e.to_string()))?
    }

    pub async fn register_algorithm_async(
        &self,
        algo_key: String,
        problem_key: String,
    ) -> Result<usize> {
        self.blocking(move |l| l.register_algorithm(&algo_key, &problem_key))
            .await
    }

    pub async fn register_data_async(&self, data_key: String, problem_key: String) -> Result<usize> {
        self.blocking(move |l| l.register_data(&data_key, &problem_key))
            .await
    }

    pub async fn claim_task_async(&self, task_key: String, worker: String) -> Result<Learnuplet> {
        self.blocking(move |l| l.claim_task(&task_key, &worker)).await
    }

    pub async fn report_task_async(
        &self,
        task_key: String,
        report: TaskReport,
    ) -> Result<Learnuplet> {
        self.blocking(move |l| l.report_task(&task_key, report)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnledger_store::MemoryStore;

    fn ledger() -> Ledger {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        Ledger::new(store)
    }

    #[test]
    fn algorithm_on_empty_problem_schedules_nothing() {
        let ledger = ledger();
        let problem = ledger.register_problem("p", "addr", 2, &[]).unwrap();
        assert_eq!(ledger.register_algorithm("algo_a", &problem).unwrap(), 0);
        assert_eq!(ledger.get_item("algo_a").unwrap().kind, ItemKind::Algorithm);
        assert_eq!(
            ledger.resolve_lineage("algo_a"),
            Lineage {
                rank: 0,
                model_address: String::new()
            }
        );
    }

    #[test]
    fn test_data_cannot_be_registered_again_as_train_data() {
        let ledger = ledger();
        let problem = ledger
            .register_problem("p", "addr", 1, &["t0".to_string()])
            .unwrap();
        ledger.register_algorithm("algo_a", &problem).unwrap();
        assert!(matches!(
            ledger.register_data("t0", &problem),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(ledger.list_tasks_by_algo("algo_a").unwrap().is_empty());
    }

    #[test]
    fn data_for_missing_problem_is_stored_but_not_scheduled() {
        let ledger = ledger();
        assert_eq!(ledger.register_data("d0", "problem_ghost").unwrap(), 0);
        assert_eq!(ledger.get_item("d0").unwrap().problem_key, "problem_ghost");
    }

    #[test]
    fn listings_skip_dangling_index_entries() {
        let ledger = ledger();
        let problem = ledger.register_problem("p", "addr", 1, &[]).unwrap();
        ledger.register_data("d0", &problem).unwrap();
        ledger.register_algorithm("algo_a", &problem).unwrap();
        let tasks = ledger.list_tasks_by_status(TaskStatus::Todo).unwrap();
        assert_eq!(tasks.len(), 1);
        ledger.store().delete(&tasks[0].key).unwrap();
        assert!(ledger.list_tasks_by_status(TaskStatus::Todo).unwrap().is_empty());
        assert!(matches!(
            ledger.get_task(&tasks[0].key),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
