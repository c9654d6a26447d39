#![forbid(unsafe_code)]

pub mod common;
pub mod measurement;
pub mod result_tree;
pub mod run;

pub use common::{ContractViolation, SchemaVersion, Validate};
