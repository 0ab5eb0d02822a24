//! Primary records and their secondary indexes are only ever written together
//! through [`IndexedWriter`], one store batch per mutation.

use learnledger_store::{CompositeKey, RecordStore, StoreError, WriteBatch};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LedgerError, Result};
use crate::model::{Item, ItemKind, Learnuplet, Problem, TaskStatus};

pub const TASK_DOC: &str = "learnuplet";
pub const TASK_ALGO_INDEX: &str = "learnuplet~algo~key";
pub const TASK_STATUS_INDEX: &str = "learnuplet~status~key";

const MARKER: [u8; 1] = [0x00];

pub fn item_index_key(kind: ItemKind, problem_key: &str, item_key: &str) -> Result<String> {
    Ok(CompositeKey::new(kind.index_name(), [kind.as_str(), problem_key, item_key])?.encode())
}

pub fn task_algo_index_key(algo_key: &str, task_key: &str) -> Result<String> {
    Ok(CompositeKey::new(TASK_ALGO_INDEX, [TASK_DOC, algo_key, task_key])?.encode())
}

pub fn task_status_index_key(status: TaskStatus, task_key: &str) -> Result<String> {
    Ok(CompositeKey::new(TASK_STATUS_INDEX, [TASK_DOC, status.as_str(), task_key])?.encode())
}

pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| LedgerError::Parse {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &[u8]) -> Result<T> {
    serde_json::from_slice(raw).map_err(|source| LedgerError::Parse {
        key: key.to_string(),
        source,
    })
}

/// A decoded record plus the exact bytes it was decoded from, used as the
/// precondition of a later guarded write.
pub(crate) struct Loaded<T> {
    pub value: T,
    pub raw: Vec<u8>,
}

pub(crate) fn load<S, T>(store: &S, kind: &'static str, key: &str) -> Result<Loaded<T>>
where
    S: RecordStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = store
        .get(key)?
        .ok_or_else(|| LedgerError::not_found(kind, key))?;
    let value = decode(key, &raw)?;
    Ok(Loaded { value, raw })
}

/// Keys held by the last component of every entry under a partial index key.
pub(crate) fn indexed_keys<S>(store: &S, index: &str, components: &[&str]) -> Result<Vec<String>>
where
    S: RecordStore + ?Sized,
{
    let mut out = Vec::new();
    for entry in store.scan_composite_prefix(index, components)? {
        let entry = entry?;
        match entry.last() {
            Some(key) => out.push(key.to_string()),
            None => tracing::warn!(index, "index entry without components skipped"),
        }
    }
    Ok(out)
}

fn first_write(written: std::result::Result<(), StoreError>, kind: &str, key: &str) -> Result<()> {
    match written {
        Err(StoreError::Conflict { .. }) => {
            Err(LedgerError::invalid(format!("{kind} {key} already registered")))
        }
        other => other.map_err(LedgerError::from),
    }
}

pub struct IndexedWriter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> IndexedWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Problems are written once; a second registration of `key` is rejected.
    pub fn insert_problem(&self, key: &str, problem: &Problem) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.expect(key, None).put(key, encode(key, problem)?);
        first_write(self.store.write(batch), "problem", key)
    }

    /// Item record plus its `(kind, problem)` index entry. The key must be
    /// free: an item never changes kind or problem.
    pub fn insert_item(&self, key: &str, item: &Item) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch
            .expect(key, None)
            .put(key, encode(key, item)?)
            .put(item_index_key(item.kind, &item.problem_key, key)?, MARKER);
        first_write(self.store.write(batch), item.kind.as_str(), key)
    }

    /// New task record plus its algo and status index entries. Fails with a
    /// store conflict if the key is already taken.
    pub fn insert_task(&self, key: &str, task: &Learnuplet) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch
            .expect(key, None)
            .put(key, encode(key, task)?)
            .put(task_algo_index_key(&task.algo_key, key)?, MARKER)
            .put(task_status_index_key(task.status, key)?, MARKER);
        self.store.write(batch)?;
        Ok(())
    }

    /// Rewrites a task whose stored bytes were `prior_raw` and moves its status
    /// index entry from `prior_status` to `updated.status`.
    pub fn update_task(
        &self,
        key: &str,
        prior_raw: Vec<u8>,
        prior_status: TaskStatus,
        updated: &Learnuplet,
    ) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.expect(key, Some(prior_raw)).put(key, encode(key, updated)?);
        if prior_status != updated.status {
            batch
                .delete(task_status_index_key(prior_status, key)?)
                .put(task_status_index_key(updated.status, key)?, MARKER);
        }
        self.store.write(batch)?;
        Ok(())
    }
}
