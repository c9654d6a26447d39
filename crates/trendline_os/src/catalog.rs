#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use trendline_kernel_contracts::run::{JobName, RunInfo, RunKey};
use trendline_kernel_contracts::{ContractViolation, Validate};

/// Host view of a job's runs. Order of the returned runs is not significant.
pub trait RunCatalog {
    fn runs_of_job(&self, job: &JobName) -> Vec<RunInfo>;
}

impl<C: RunCatalog + ?Sized> RunCatalog for &C {
    fn runs_of_job(&self, job: &JobName) -> Vec<RunInfo> {
        (**self).runs_of_job(job)
    }
}

/// In-process catalog fed by the embedder as runs start and finish.
#[derive(Debug, Default)]
pub struct StaticRunCatalog {
    runs: Mutex<BTreeMap<RunKey, RunInfo>>,
}

impl StaticRunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, run: RunInfo) -> Result<(), ContractViolation> {
        run.validate()?;
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run.key.clone(), run);
        Ok(())
    }

    /// Flags a known run as no longer building. Unknown runs are ignored.
    pub fn mark_finished(&self, key: &RunKey) -> bool {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        match runs.get_mut(key) {
            Some(run) => {
                run.building = false;
                true
            }
            None => false,
        }
    }
}

impl RunCatalog for StaticRunCatalog {
    fn runs_of_job(&self, job: &JobName) -> Vec<RunInfo> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|run| &run.key.job == job)
            .cloned()
            .collect()
    }
}
