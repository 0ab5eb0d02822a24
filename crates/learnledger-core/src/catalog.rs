use learnledger_store::{range_end, RecordStore};

use crate::error::{LedgerError, Result};
use crate::index::{decode, indexed_keys, load, IndexedWriter};
use crate::model::{problem_key, validate_key, Item, ItemKind, Problem, PROBLEM_KEY_PREFIX};

/// Problems and items, plus the `(kind, problem) -> item` index.
pub struct Catalog<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Catalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stores the problem under `problem_<external_id>` and registers each test
    /// data key as a data item of that problem. Test data never triggers
    /// scheduling. Nothing is written when the problem or one of its test
    /// data keys is already registered.
    pub fn register_problem(
        &self,
        external_id: &str,
        storage_address: &str,
        train_batch_size: usize,
        test_data_keys: &[String],
    ) -> Result<String> {
        validate_key("problem", external_id)?;
        if train_batch_size == 0 {
            return Err(LedgerError::invalid("train batch size must be positive"));
        }
        let key = problem_key(external_id);
        let mut test_data: Vec<String> = Vec::with_capacity(test_data_keys.len());
        for data_key in test_data_keys {
            let data_key = data_key.trim();
            validate_key("test data", data_key)?;
            if !test_data.iter().any(|k| k == data_key) {
                test_data.push(data_key.to_string());
            }
        }
        if self.store.get(&key)?.is_some() {
            return Err(LedgerError::invalid(format!("problem {key} already registered")));
        }
        for data_key in &test_data {
            if self.store.get(data_key)?.is_some() {
                return Err(LedgerError::invalid(format!(
                    "test data {data_key} already registered"
                )));
            }
        }
        for data_key in &test_data {
            self.store_item(data_key, ItemKind::Data, &key)?;
            tracing::debug!(problem = %key, data = %data_key, "test data registered");
        }
        let problem = Problem {
            storage_address: storage_address.to_string(),
            train_batch_size,
            test_data_keys: test_data,
        };
        IndexedWriter::new(self.store).insert_problem(&key, &problem)?;
        tracing::info!(problem = %key, batch = train_batch_size, "problem registered");
        Ok(key)
    }

    pub fn store_item(&self, key: &str, kind: ItemKind, problem_key: &str) -> Result<Item> {
        validate_key(kind.as_str(), key)?;
        validate_key("problem", problem_key)?;
        let item = Item {
            kind,
            problem_key: problem_key.to_string(),
        };
        IndexedWriter::new(self.store).insert_item(key, &item)?;
        Ok(item)
    }

    pub fn problem(&self, key: &str) -> Result<Problem> {
        Ok(load::<_, Problem>(self.store, "problem", key)?.value)
    }

    pub fn item(&self, key: &str) -> Result<Item> {
        Ok(load::<_, Item>(self.store, "item", key)?.value)
    }

    pub fn list_problems(&self) -> Result<Vec<(String, Problem)>> {
        let high = range_end(PROBLEM_KEY_PREFIX);
        let mut out = Vec::new();
        for row in self.store.scan_range(PROBLEM_KEY_PREFIX, &high)? {
            let (key, raw) = row?;
            let problem = decode(&key, &raw)?;
            out.push((key, problem));
        }
        Ok(out)
    }

    /// Every item of `kind` across all problems.
    pub fn list_items(&self, kind: ItemKind) -> Result<Vec<(String, Item)>> {
        let keys = indexed_keys(self.store, kind.index_name(), &[kind.as_str()])?;
        keys.into_iter()
            .map(|key| {
                let item = self.item(&key)?;
                Ok((key, item))
            })
            .collect()
    }

    /// Keys of the items of `kind` attached to `problem_key`, in index order.
    pub fn problem_item_keys(&self, kind: ItemKind, problem_key: &str) -> Result<Vec<String>> {
        let keys = indexed_keys(self.store, kind.index_name(), &[kind.as_str(), problem_key])?;
        tracing::debug!(problem = %problem_key, kind = %kind, found = keys.len(), "problem items");
        Ok(keys)
    }
}
