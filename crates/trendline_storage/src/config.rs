#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use trendline_kernel_contracts::{ContractViolation, Validate};

pub const STORE_ROOT_ENV: &str = "TRENDLINE_STORE_ROOT";
pub const CACHE_CAPACITY_ENV: &str = "TRENDLINE_CACHE_CAPACITY";

pub const DEFAULT_CACHE_CAPACITY: usize = 64;
pub const MAX_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStoreConfig {
    pub root_dir: PathBuf,
    /// Upper bound on run stores kept materialized at once.
    pub cache_capacity: usize,
}

impl RunStoreConfig {
    pub fn mvp_v1(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn from_env() -> Result<Self, ContractViolation> {
        let root_dir = env::var(STORE_ROOT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_store_root);
        let cache_capacity = match env::var(CACHE_CAPACITY_ENV) {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ContractViolation::InvalidValue {
                    field: "run_store_config.cache_capacity",
                    reason: "must be an unsigned integer",
                })?,
            Err(_) => DEFAULT_CACHE_CAPACITY,
        };
        let config = Self {
            root_dir,
            cache_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Validate for RunStoreConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "run_store_config.root_dir",
                reason: "must be non-empty",
            });
        }
        if !(1..=MAX_CACHE_CAPACITY).contains(&self.cache_capacity) {
            return Err(ContractViolation::InvalidRange {
                field: "run_store_config.cache_capacity",
                min: 1.0,
                max: MAX_CACHE_CAPACITY as f64,
                got: self.cache_capacity as f64,
            });
        }
        Ok(())
    }
}

fn default_store_root() -> PathBuf {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join("trendline");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("trendline");
    }
    PathBuf::from(".trendline")
}
