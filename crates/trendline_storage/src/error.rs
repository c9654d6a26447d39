#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;
use trendline_kernel_contracts::ContractViolation;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run store schema version {got} (expected {expected})")]
    SchemaMismatch { expected: u32, got: u32 },

    #[error("run store checksum mismatch (stored {stored}, computed {computed})")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("invalid storage location `{}`", .0.display())]
    InvalidLocation(PathBuf),

    #[error("run `{run}` already has a persisted measurement store")]
    AlreadyCommitted { run: String },

    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
}
