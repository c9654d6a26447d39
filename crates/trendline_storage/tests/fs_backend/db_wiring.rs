#![forbid(unsafe_code)]

use std::fs;

use trendline_kernel_contracts::measurement::{
    Measurement, NodeIdentity, RunMeasurementStore, RunMeasurementStoreBuilder,
};
use trendline_kernel_contracts::run::{JobName, RunKey};
use trendline_storage::backend::{FsRunStoreBackend, RunStoreBackend, RUN_STORE_FILE_NAME};
use trendline_storage::config::RunStoreConfig;
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

#[test]
fn at_fs_db_01_commit_writes_one_artifact_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunStoreConfig::mvp_v1(dir.path().to_path_buf());
    let backend = FsRunStoreBackend::from_config(&config).unwrap();
    let cache = RunStoreCache::from_config(backend, &config).unwrap();

    cache.commit(&run(1), store_with("12.5")).unwrap();

    let path = dir
        .path()
        .join("team")
        .join("perf")
        .join("1")
        .join(RUN_STORE_FILE_NAME);
    assert!(path.is_file());
    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["schema_version"], 1);
    assert_eq!(doc["nodes"]["suite/caseA"][0]["value"], "12.5");

    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn at_fs_db_02_fresh_cache_rematerializes_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    {
        let cache =
            RunStoreCache::new(FsRunStoreBackend::new(root.clone()).unwrap(), 4).unwrap();
        cache.commit(&run(2), store_with("13.1")).unwrap();
    }
    let cache = RunStoreCache::new(FsRunStoreBackend::new(root).unwrap(), 4).unwrap();
    let store = cache.load(&run(2));
    assert_eq!(store.measurement(&case_a(), "latency_ms").unwrap().value, "13.1");
}

#[test]
fn at_fs_db_03_empty_store_leaves_no_trace_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsRunStoreBackend::new(dir.path().to_path_buf()).unwrap();
    let cache = RunStoreCache::new(backend.clone(), 4).unwrap();
    cache.commit(&run(3), RunMeasurementStore::empty()).unwrap();
    assert!(!backend.run_store_path(&run(3)).exists());
    assert!(backend.read(&run(3)).unwrap().is_none());
}

#[test]
fn at_fs_db_04_existing_artifact_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsRunStoreBackend::new(dir.path().to_path_buf()).unwrap();
    backend.write(&run(4), b"{}").unwrap();
    assert!(matches!(
        backend.write(&run(4), b"{\"other\":1}"),
        Err(StorageError::AlreadyCommitted { .. })
    ));
    assert_eq!(backend.read(&run(4)).unwrap().unwrap(), b"{}".to_vec());
}

#[test]
fn at_fs_db_05_corrupt_or_misplaced_artifacts_read_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsRunStoreBackend::new(dir.path().to_path_buf()).unwrap();

    let corrupt = backend.run_store_path(&run(5));
    fs::create_dir_all(corrupt.parent().unwrap()).unwrap();
    fs::write(&corrupt, "{\"schema_version\":1,").unwrap();

    let misplaced = backend.run_store_path(&run(6));
    fs::create_dir_all(&misplaced).unwrap();
    assert!(matches!(
        backend.read(&run(6)),
        Err(StorageError::InvalidLocation(_))
    ));

    let cache = RunStoreCache::new(backend, 4).unwrap();
    assert!(cache.load(&run(5)).is_empty());
    assert!(cache.load(&run(6)).is_empty());
}
