#![forbid(unsafe_code)]

pub mod catalog;
pub mod graph;
pub mod history;
pub mod logging;
pub mod publisher;
pub mod resolver;
