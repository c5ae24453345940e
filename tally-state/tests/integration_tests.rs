use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tally_core::{AllocationRecord, Quantity, ResourceName, ResourceSpec, WorkloadId};
use tally_state::*;

/// Route store logs to the test harness; `RUST_LOG` overrides the level
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn pod(id: &str) -> WorkloadId {
    WorkloadId::new(id).unwrap()
}

fn spec(cpu_req: i64, cpu_lim: i64) -> ResourceSpec {
    ResourceSpec::new()
        .with_request(ResourceName::Cpu, Quantity::from_millis(cpu_req))
        .with_limit(ResourceName::Cpu, Quantity::from_millis(cpu_lim))
}

fn scratch_checkpoint() -> PathBuf {
    std::env::temp_dir()
        .join(format!("tally-state-it-{}", std::process::id()))
        .join(format!("{:?}.json", thread::current().id()).replace(['(', ')'], ""))
}

/// Every store implementation must pass the same contract checks
fn stores() -> Vec<(&'static str, Arc<dyn AllocationState>)> {
    let path = scratch_checkpoint();
    let _ = std::fs::remove_file(&path);
    vec![
        ("memory", Arc::new(MemoryState::default())),
        ("checkpoint", Arc::new(CheckpointState::open(path).unwrap())),
    ]
}

#[test]
fn test_reads_are_isolated_copies() {
    for (name, state) in stores() {
        let w = pod("isolated");
        state.set_aggregate_resources(&w, spec(100, 200)).unwrap();
        state.set_container_resources(&w, "c1", spec(50, 100)).unwrap();

        let mut aggregate = state.aggregate_resources(&w);
        aggregate.limits.clear();
        aggregate
            .requests
            .insert(ResourceName::Memory, Quantity::from_bytes(1));
        assert_eq!(state.aggregate_resources(&w), spec(100, 200), "{name}");

        let (mut container, _) = state.container_resources(&w, "c1");
        container.requests.clear();
        assert_eq!(state.container_resources(&w, "c1").0, spec(50, 100), "{name}");

        let mut snapshot = state.snapshot();
        snapshot.clear();
        assert_eq!(state.snapshot().len(), 1, "{name}");
    }
}

#[test]
fn test_snapshot_does_not_reflect_later_writes() {
    for (name, state) in stores() {
        let w = pod("snap");
        state.set_container_resources(&w, "c1", spec(10, 20)).unwrap();

        let before = state.snapshot();
        state.set_container_resources(&w, "c1", spec(30, 40)).unwrap();
        state.set_container_resources(&pod("other"), "c1", spec(1, 1)).unwrap();

        assert_eq!(before.len(), 1, "{name}");
        assert_eq!(before[&w].containers["c1"], spec(10, 20), "{name}");
    }
}

#[test]
fn test_cascading_delete_ignores_aggregate() {
    for (name, state) in stores() {
        let w = pod("cascade");
        state.set_aggregate_resources(&w, spec(100, 100)).unwrap();
        state.set_container_resources(&w, "c1", spec(50, 100)).unwrap();
        state.set_container_resources(&w, "c2", spec(50, 100)).unwrap();

        state.delete(&w, "c1").unwrap();
        assert!(state.snapshot().contains_key(&w), "{name}");

        state.delete(&w, "c2").unwrap();
        assert!(!state.snapshot().contains_key(&w), "{name}");
    }
}

#[test]
fn test_reclaim_orphans_is_idempotent() {
    for (name, state) in stores() {
        for id in ["a", "b", "c", "d"] {
            state.set_container_resources(&pod(id), "c1", spec(1, 2)).unwrap();
        }
        let live: HashSet<_> = [pod("b"), pod("d"), pod("never-seen")].into_iter().collect();

        state.reclaim_orphans(&live).unwrap();
        let once = state.snapshot();
        let second = state.reclaim_orphans(&live).unwrap();

        assert!(second.is_empty(), "{name}");
        assert_eq!(state.snapshot(), once, "{name}");
        assert_eq!(once.len(), 2, "{name}");
    }
}

#[test]
fn test_reader_capability_is_enough_for_queries() {
    let state: Arc<dyn AllocationState> = Arc::new(MemoryState::default());
    let w = pod("ro");
    let record = AllocationRecord::new()
        .with_aggregate(spec(100, 100))
        .with_container("c1", spec(100, 100));
    state.set_record(&w, record.clone()).unwrap();

    let reader: Arc<dyn AllocationReader> = state;
    assert_eq!(reader.snapshot()[&w], record);
}

#[test]
fn test_concurrent_writers_and_readers() {
    init_tracing();

    let state = Arc::new(MemoryState::default());
    let workloads: Vec<_> = (0..8).map(|i| pod(&format!("pod-{i}"))).collect();

    let mut handles = Vec::new();
    for (i, w) in workloads.iter().cloned().enumerate() {
        let state = Arc::clone(&state);
        handles.push(thread::spawn(move || {
            for round in 0..200 {
                let millis = i64::try_from(i * 1000 + round).unwrap();
                let record = AllocationRecord::new()
                    .with_aggregate(spec(millis, millis))
                    .with_container("c1", spec(millis, millis));
                state.set_record(&w, record).unwrap();
            }
        }));
    }

    for _ in 0..4 {
        let state = Arc::clone(&state);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                // A record is installed atomically, so aggregate and
                // container always come from the same write.
                for record in state.snapshot().values() {
                    assert_eq!(record.aggregate, record.containers["c1"]);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let table = state.snapshot();
    assert_eq!(table.len(), workloads.len());
    for (i, w) in workloads.iter().enumerate() {
        let last = i64::try_from(i * 1000 + 199).unwrap();
        assert_eq!(table[w].aggregate, spec(last, last));
    }
}

#[test]
fn test_reclaim_racing_a_write_never_tears() {
    init_tracing();

    let state = Arc::new(MemoryState::default());
    let w = pod("racer");
    let live = HashSet::new();

    let writer = {
        let state = Arc::clone(&state);
        let w = w.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                state.set_container_resources(&w, "c1", spec(1, 1)).unwrap();
            }
        })
    };
    let sweeper = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            for _ in 0..500 {
                state.reclaim_orphans(&live).unwrap();
            }
        })
    };

    writer.join().unwrap();
    sweeper.join().unwrap();

    // Either the sweep ran last or the write re-created the entry.
    let table = state.snapshot();
    if let Some(record) = table.get(&w) {
        assert_eq!(record.containers["c1"], spec(1, 1));
    }
}
