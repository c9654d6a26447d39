#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use trendline_kernel_contracts::run::RunKey;

use crate::config::RunStoreConfig;
use crate::StorageError;

pub const RUN_STORE_FILE_NAME: &str = "measurement-plots.json";

/// Durable home of serialized run stores, one blob per run.
///
/// `read` returns `Ok(None)` when the run never persisted anything. `write` is
/// called at most once per run.
pub trait RunStoreBackend: Send + Sync {
    fn read(&self, run: &RunKey) -> Result<Option<Vec<u8>>, StorageError>;
    fn write(&self, run: &RunKey, bytes: &[u8]) -> Result<(), StorageError>;
}

impl<B: RunStoreBackend + ?Sized> RunStoreBackend for Arc<B> {
    fn read(&self, run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(run)
    }

    fn write(&self, run: &RunKey, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(run, bytes)
    }
}

/// Stores each run under `<root>/<job>/<run number>/measurement-plots.json`.
#[derive(Debug, Clone)]
pub struct FsRunStoreBackend {
    root_dir: PathBuf,
}

impl FsRunStoreBackend {
    pub fn new(root_dir: PathBuf) -> Result<Self, StorageError> {
        if root_dir.as_os_str().is_empty() {
            return Err(StorageError::InvalidLocation(root_dir));
        }
        Ok(Self { root_dir })
    }

    pub fn from_config(config: &RunStoreConfig) -> Result<Self, StorageError> {
        Self::new(config.root_dir.clone())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn run_store_path(&self, run: &RunKey) -> PathBuf {
        let mut path = self.root_dir.clone();
        for segment in run.job.segments() {
            path.push(segment);
        }
        path.push(run.number.to_string());
        path.push(RUN_STORE_FILE_NAME);
        path
    }
}

impl RunStoreBackend for FsRunStoreBackend {
    fn read(&self, run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.run_store_path(run);
        if !path.exists() {
            return Ok(None);
        }
        if !path.is_file() {
            return Err(StorageError::InvalidLocation(path));
        }
        Ok(Some(fs::read(&path)?))
    }

    fn write(&self, run: &RunKey, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.run_store_path(run);
        if path.exists() {
            return Err(StorageError::AlreadyCommitted {
                run: run.to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&path, bytes)?;
        tracing::debug!(run = %run, path = %path.display(), "run store written");
        Ok(())
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// Process-local backend for tests and embedders without a data directory.
#[derive(Debug, Default)]
pub struct InMemoryRunStoreBackend {
    blobs: Mutex<BTreeMap<RunKey, Vec<u8>>>,
}

impl InMemoryRunStoreBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RunStoreBackend for InMemoryRunStoreBackend {
    fn read(&self, run: &RunKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run)
            .cloned())
    }

    fn write(&self, run: &RunKey, bytes: &[u8]) -> Result<(), StorageError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        if blobs.contains_key(run) {
            return Err(StorageError::AlreadyCommitted {
                run: run.to_string(),
            });
        }
        blobs.insert(run.clone(), bytes.to_vec());
        Ok(())
    }
}
