use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{BatchOp, RecordStore, ScanIter, StoreError, WriteBatch};

/// In-process store for tests and single-node runs. Scans return a snapshot
/// taken under the read lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn scan_range(&self, low: &str, high: &str) -> Result<ScanIter<'_>, StoreError> {
        if low >= high {
            return Ok(Box::new(std::iter::empty()));
        }
        let map = self.read()?;
        let rows: Vec<Result<(String, Vec<u8>), StoreError>> = map
            .range::<str, _>((Bound::Included(low), Bound::Excluded(high)))
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut map = self.write_guard()?;
        for (key, expected) in batch.expectations() {
            if map.get(key) != expected.as_ref() {
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key.clone(), value.clone());
                }
                BatchOp::Delete { key } => {
                    map.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{composite_prefix, CompositeKey};

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        store.put("problem_1", b"{}").unwrap();
        assert_eq!(store.get("problem_1").unwrap().as_deref(), Some(&b"{}"[..]));
        store.delete("problem_1").unwrap();
        assert!(store.get("problem_1").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn range_scan_is_ordered_and_half_open() {
        let store = MemoryStore::new();
        for k in ["algo_b", "algo_a", "data_a", "algo_c"] {
            store.put(k, b"x").unwrap();
        }
        let keys: Vec<String> = store
            .scan_range("algo_", "algo_c")
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec!["algo_a", "algo_b"]);
        assert_eq!(store.scan_range("z", "a").unwrap().count(), 0);
    }

    #[test]
    fn composite_prefix_scan_returns_split_keys() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for (status, key) in [("todo", "t1"), ("todo", "t2"), ("pending", "t3")] {
            let ck = CompositeKey::new("learnuplet~status~key", ["learnuplet", status, key]).unwrap();
            batch.put(ck.encode(), vec![0u8]);
        }
        store.write(batch).unwrap();
        let todo: Vec<String> = store
            .scan_composite_prefix("learnuplet~status~key", &["learnuplet", "todo"])
            .unwrap()
            .map(|r| r.unwrap().last().unwrap().to_string())
            .collect();
        assert_eq!(todo, vec!["t1", "t2"]);
        let prefix = composite_prefix("learnuplet~status~key", &["learnuplet"]).unwrap();
        assert!(store.get(&prefix).unwrap().is_none());
    }

    #[test]
    fn failed_expectation_rejects_whole_batch() {
        let store = MemoryStore::new();
        store.put("k", b"v1").unwrap();
        let mut batch = WriteBatch::new();
        batch
            .expect("k", Some(b"stale".to_vec()))
            .put("k", b"v2".to_vec())
            .put("other", b"x".to_vec());
        let err = store.write(batch).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref key } if key == "k"));
        assert_eq!(store.get("k").unwrap().unwrap(), b"v1");
        assert!(store.get("other").unwrap().is_none());

        let mut ok = WriteBatch::new();
        ok.expect("k", Some(b"v1".to_vec())).put("k", b"v2".to_vec());
        store.write(ok).unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"v2");
    }
}
