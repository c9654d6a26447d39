#![forbid(unsafe_code)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod run_cache;

pub use error::StorageError;
