//! Key-value record store contract consumed by the ledger core, plus the two
//! backends shipped with the workspace: an in-process `MemoryStore` and a
//! durable `SqliteStore`.
//!
//! Keys are UTF-8 strings ordered bytewise. Keys starting with `\0` belong to
//! the composite-key namespace (see [`CompositeKey`]) and never collide with
//! primary record keys.

mod batch;
mod composite;
mod memory;
mod sqlite;

use std::sync::Arc;

pub use batch::{BatchOp, WriteBatch};
pub use composite::{composite_prefix, range_end, CompositeKey};
pub use memory::MemoryStore;
pub use sqlite::{SqliteOptions, SqliteStore};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A batch precondition did not hold: the record changed since it was read.
    #[error("write conflict on {key}")]
    Conflict { key: String },
    #[error("malformed composite key: {0:?}")]
    MalformedKey(String),
    #[error("invalid key component: {0:?}")]
    InvalidComponent(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Ordered `(key, value)` pairs from a range scan. Items are fallible so a
/// backend can surface a failure midway through iteration.
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>), StoreError>> + Send + 'a>;

/// Composite keys matching a partial composite key.
pub type CompositeIter<'a> = Box<dyn Iterator<Item = Result<CompositeKey, StoreError>> + Send + 'a>;

/// Point reads, ordered scans and atomic write batches over string keys.
///
/// A single [`RecordStore::write`] call is applied atomically; nothing spans
/// two calls.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Keys in `[low, high)`, ascending.
    fn scan_range(&self, low: &str, high: &str) -> Result<ScanIter<'_>, StoreError>;

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)
    }

    /// Every composite key of `index` whose leading components equal
    /// `components`.
    fn scan_composite_prefix(
        &self,
        index: &str,
        components: &[&str],
    ) -> Result<CompositeIter<'_>, StoreError> {
        let low = composite_prefix(index, components)?;
        let high = range_end(&low);
        let rows = self.scan_range(&low, &high)?;
        Ok(Box::new(rows.map(|row| {
            row.and_then(|(key, _)| CompositeKey::parse(&key))
        })))
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn scan_range(&self, low: &str, high: &str) -> Result<ScanIter<'_>, StoreError> {
        (**self).scan_range(low, high)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).write(batch)
    }

    fn scan_composite_prefix(
        &self,
        index: &str,
        components: &[&str],
    ) -> Result<CompositeIter<'_>, StoreError> {
        (**self).scan_composite_prefix(index, components)
    }
}
