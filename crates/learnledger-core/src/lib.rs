//! Learnuplet orchestration over an ordered key-value store.
//!
//! Registering an algorithm or a data item schedules chains of ranked
//! training tasks ("learnuplets"); workers claim them and report results, and
//! the per-algorithm model lineage is derived from that history on demand.

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod ledger;
pub mod lifecycle;
pub mod lineage;
pub mod model;
pub mod perf;
pub mod scheduler;

pub use catalog::Catalog;
pub use config::{load_config, Config, StoreBackend};
pub use error::{LedgerError, Result};
pub use index::IndexedWriter;
pub use ledger::Ledger;
pub use lifecycle::{next_status, Lifecycle, TaskEvent, TaskReport, AUDIT_TARGET};
pub use lineage::{fold_lineage, Lineage, Resolver};
pub use model::{Item, ItemKind, Learnuplet, Problem, TaskRecord, TaskStatus};
pub use scheduler::{plan_batches, Scheduler};
