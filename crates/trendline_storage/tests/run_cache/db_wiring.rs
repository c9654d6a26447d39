#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use trendline_kernel_contracts::measurement::{
    Measurement, NodeIdentity, RunMeasurementStore, RunMeasurementStoreBuilder,
};
use trendline_kernel_contracts::run::{JobName, RunKey};
use trendline_storage::backend::{InMemoryRunStoreBackend, RunStoreBackend};
use trendline_storage::codec::RunStoreCodec;
use trendline_storage::run_cache::RunStoreCache;
use trendline_storage::StorageError;

fn run(number: u64) -> RunKey {
    RunKey::v1(JobName::new("team/perf").unwrap(), number).unwrap()
}

fn case_a() -> NodeIdentity {
    NodeIdentity::new("suite/caseA").unwrap()
}

fn store_with(value: &str) -> RunMeasurementStore {
    let mut builder = RunMeasurementStoreBuilder::new();
    builder.record(&case_a(), Measurement::new("latency_ms", value));
    builder.build()
}

/// Returns a different artifact on every read and dawdles so readers overlap.
#[derive(Default)]
struct ShiftingBackend {
    reads: AtomicUsize,
}

impl RunStoreBackend for ShiftingBackend {
    fn read(&self, _run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        RunStoreCodec
            .encode(&store_with(&format!("{call}")))
            .map(Some)
    }

    fn write(&self, _run: &RunKey, _bytes: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Blocks inside `write` until released, to observe readers waiting on a commit.
struct GatedBackend {
    inner: InMemoryRunStoreBackend,
    entered: Barrier,
    release: Barrier,
}

impl RunStoreBackend for GatedBackend {
    fn read(&self, run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.read(run)
    }

    fn write(&self, run: &RunKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.entered.wait();
        self.release.wait();
        self.inner.write(run, bytes)
    }
}

#[test]
fn at_cache_db_01_concurrent_first_load_is_deduplicated() {
    let cache = Arc::new(RunStoreCache::new(ShiftingBackend::default(), 8).unwrap());
    let readers = 4;
    let barrier = Arc::new(Barrier::new(readers));

    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.load(&run(1))
            })
        })
        .collect();
    let stores: Vec<Arc<RunMeasurementStore>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(cache.backend().reads.load(Ordering::SeqCst), 1);
    for store in &stores {
        assert!(Arc::ptr_eq(store, &stores[0]));
        assert_eq!(store.measurement(&case_a(), "latency_ms").unwrap().value, "0");
    }
}

#[test]
fn at_cache_db_02_reader_waits_for_in_progress_commit() {
    let backend = Arc::new(GatedBackend {
        inner: InMemoryRunStoreBackend::new(),
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let cache = Arc::new(RunStoreCache::new(Arc::clone(&backend), 8).unwrap());

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.commit(&run(2), store_with("13.1")))
    };
    backend.entered.wait();

    let reader = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.load(&run(2)))
    };
    thread::sleep(Duration::from_millis(20));
    backend.release.wait();

    writer.join().unwrap().unwrap();
    let seen = reader.join().unwrap();
    assert_eq!(seen.measurement(&case_a(), "latency_ms").unwrap().value, "13.1");
}

#[test]
fn at_cache_db_03_loads_of_distinct_runs_proceed_independently() {
    let backend = InMemoryRunStoreBackend::new();
    for number in 1..=6 {
        let bytes = RunStoreCodec.encode(&store_with(&number.to_string())).unwrap();
        backend.write(&run(number), &bytes).unwrap();
    }
    let cache = Arc::new(RunStoreCache::new(backend, 3).unwrap());
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (1..=6)
        .map(|number| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let store = cache.load(&run(number));
                store
                    .measurement(&case_a(), "latency_ms")
                    .map(|m| m.value.clone())
            })
        })
        .collect();

    for (number, handle) in (1..=6u64).zip(handles) {
        assert_eq!(handle.join().unwrap(), Some(number.to_string()));
    }

    // once every loader is done, the next access trims back to capacity
    cache.load(&run(1));
    assert!(cache.len() <= cache.capacity());
}

/// First read parks until released; later reads return immediately.
struct ParkedFirstReadBackend {
    reads: AtomicUsize,
    entered: Barrier,
    release: Barrier,
}

impl RunStoreBackend for ParkedFirstReadBackend {
    fn read(&self, _run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.entered.wait();
            self.release.wait();
        }
        RunStoreCodec
            .encode(&store_with(&format!("{call}")))
            .map(Some)
    }

    fn write(&self, _run: &RunKey, _bytes: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }
}

#[test]
fn at_cache_db_04_slot_in_use_survives_eviction_requests() {
    let backend = Arc::new(ParkedFirstReadBackend {
        reads: AtomicUsize::new(0),
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let cache = Arc::new(RunStoreCache::new(Arc::clone(&backend), 1).unwrap());

    let first = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.load(&run(1)))
    };
    backend.entered.wait();

    // neither an explicit evict, a clear, nor capacity pressure may drop the busy slot
    assert!(!cache.evict(&run(1)));
    cache.clear();
    cache.load(&run(2));
    assert!(cache.contains(&run(1)));

    let second = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.load(&run(1)))
    };
    thread::sleep(Duration::from_millis(20));
    backend.release.wait();

    let first = first.join().unwrap();
    let second = second.join().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.measurement(&case_a(), "latency_ms").unwrap().value, "0");
    // one read for run 1, one for run 2
    assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
}
