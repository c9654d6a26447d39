#![forbid(unsafe_code)]

pub mod attribution;
pub mod collect;
pub mod extractor;
pub mod walker;
