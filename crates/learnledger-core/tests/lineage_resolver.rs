use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use learnledger_core::index::{task_algo_index_key, IndexedWriter};
use learnledger_core::{Learnuplet, Ledger, Lineage, Problem, Resolver, TaskReport, TaskStatus};
use learnledger_store::{MemoryStore, RecordStore, ScanIter, StoreError, WriteBatch};

fn problem() -> Problem {
    Problem {
        storage_address: "addr".into(),
        train_batch_size: 1,
        test_data_keys: vec![],
    }
}

fn task(rank: i64, status: TaskStatus, perf: f64, model_end: &str) -> Learnuplet {
    let mut t = Learnuplet::todo("problem_p", &problem(), "algo_a", "", vec!["d".into()], rank);
    t.status = status;
    t.perf = perf;
    t.model_end_address = model_end.into();
    t
}

fn seed<S: RecordStore + ?Sized>(store: &S, tasks: &[(&str, Learnuplet)]) {
    let writer = IndexedWriter::new(store);
    for (key, task) in tasks {
        writer.insert_task(key, task).unwrap();
    }
}

#[test]
fn done_then_todo_resolves_to_open_frontier() {
    let store = MemoryStore::new();
    seed(
        &store,
        &[
            ("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0")),
            ("learnuplet_b", task(1, TaskStatus::Todo, 0.0, "")),
        ],
    );
    assert_eq!(
        Resolver::new(&store).resolve("algo_a"),
        Lineage {
            rank: 1,
            model_address: String::new()
        }
    );
}

#[test]
fn single_done_task_exposes_its_model() {
    let store = MemoryStore::new();
    seed(&store, &[("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0"))]);
    assert_eq!(
        Resolver::new(&store).resolve("algo_a"),
        Lineage {
            rank: 0,
            model_address: "M0".into()
        }
    );
}

#[test]
fn other_algorithms_do_not_leak_in() {
    let store = MemoryStore::new();
    let mut foreign = task(5, TaskStatus::Done, 1.0, "MX");
    foreign.algo_key = "algo_ab".into();
    seed(
        &store,
        &[
            ("learnuplet_a", task(0, TaskStatus::Done, 0.3, "M0")),
            ("learnuplet_z", foreign),
        ],
    );
    assert_eq!(
        Resolver::new(&store).resolve("algo_a"),
        Lineage {
            rank: 0,
            model_address: "M0".into()
        }
    );
}

#[test]
fn dangling_index_entry_makes_lineage_unknown() {
    let store = MemoryStore::new();
    seed(&store, &[("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0"))]);
    store
        .put(&task_algo_index_key("algo_a", "learnuplet_gone").unwrap(), &[0])
        .unwrap();
    assert!(Resolver::new(&store).resolve("algo_a").is_unknown());
}

#[test]
fn undecodable_task_makes_lineage_unknown() {
    let store = MemoryStore::new();
    seed(&store, &[("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0"))]);
    store.put("learnuplet_a", b"{").unwrap();
    assert_eq!(Resolver::new(&store).resolve("algo_a"), Lineage::unknown());
}

/// Fails reads whose key (or scan start) contains `poison`.
struct FaultyStore {
    inner: MemoryStore,
    poison: &'static str,
}

impl RecordStore for FaultyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if key.contains(self.poison) {
            return Err(StoreError::Backend(format!("injected read failure on {key}")));
        }
        self.inner.get(key)
    }

    fn scan_range(&self, low: &str, high: &str) -> Result<ScanIter<'_>, StoreError> {
        if low.contains(self.poison) {
            return Err(StoreError::Backend("injected scan failure".into()));
        }
        self.inner.scan_range(low, high)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.inner.write(batch)
    }
}

#[test]
fn scan_failure_makes_lineage_unknown() {
    let store = FaultyStore {
        inner: MemoryStore::new(),
        poison: "learnuplet~algo~key",
    };
    seed(&store, &[("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0"))]);
    assert!(Resolver::new(&store).resolve("algo_a").is_unknown());
}

#[test]
fn unknown_lineage_skips_scheduling_for_that_algorithm() {
    let store = Arc::new(FaultyStore {
        inner: MemoryStore::new(),
        poison: "learnuplet_",
    });
    let ledger = Ledger::new(Arc::clone(&store));
    let problem_key = ledger.register_problem("p", "addr", 1, &[]).unwrap();
    ledger.register_algorithm("algo_a", &problem_key).unwrap();
    seed(&*store, &[("learnuplet_a", task(0, TaskStatus::Done, 0.8, "M0"))]);

    assert_eq!(ledger.register_data("d0", &problem_key).unwrap(), 0);
    // the data item itself is still stored
    assert_eq!(ledger.get_item("d0").unwrap().problem_key, problem_key);
}

#[test]
fn resolving_while_data_arrives_stays_within_the_frontier() {
    const ROUNDS: i64 = 24;
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store);
    let problem_key = ledger.register_problem("p", "addr", 1, &[]).unwrap();
    ledger.register_algorithm("algo_a", &problem_key).unwrap();
    let start = ledger.resolve_lineage("algo_a");
    assert_eq!(start.rank, 0);

    let writing = AtomicBool::new(true);
    let observed = thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for i in 0..ROUNDS {
                let created = ledger.register_data(&format!("d{i:02}"), &problem_key).unwrap();
                assert_eq!(created, 1);
                let todo = ledger.list_tasks_by_status(TaskStatus::Todo).unwrap();
                assert_eq!(todo.len(), 1);
                ledger.claim_task(&todo[0].key, "w1").unwrap();
                let report = TaskReport::done(
                    i as f64,
                    Default::default(),
                    Default::default(),
                    format!("M{i}"),
                );
                ledger.report_task(&todo[0].key, report).unwrap();
            }
            writing.store(false, Ordering::Release);
        });
        let reader = scope.spawn(|| {
            let mut seen = Vec::new();
            while writing.load(Ordering::Acquire) {
                seen.push(ledger.resolve_lineage("algo_a"));
            }
            seen
        });
        writer.join().expect("writer panicked");
        reader.join().expect("resolver panicked")
    });

    let last = ledger.resolve_lineage("algo_a");
    assert_eq!(
        last,
        Lineage {
            rank: ROUNDS - 1,
            model_address: format!("M{}", ROUNDS - 1)
        }
    );
    let mut previous = start.rank;
    for lineage in &observed {
        if lineage.is_unknown() {
            assert_eq!(*lineage, Lineage::unknown());
            continue;
        }
        assert!(
            (start.rank..=last.rank).contains(&lineage.rank),
            "rank {} outside {}..={}",
            lineage.rank,
            start.rank,
            last.rank
        );
        assert!(lineage.rank >= previous, "frontier went back to {}", lineage.rank);
        previous = lineage.rank;
    }
}
