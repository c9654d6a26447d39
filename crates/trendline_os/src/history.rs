#![forbid(unsafe_code)]

use trendline_kernel_contracts::measurement::{Measurement, NodeIdentity};
use trendline_kernel_contracts::run::{RunInfo, RunKey};
use trendline_storage::backend::RunStoreBackend;

use crate::catalog::RunCatalog;
use crate::resolver::NodeMeasurementLookup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPoint {
    pub run: RunInfo,
    pub measurement: Measurement,
}

/// One measurement of one node across the finished runs of a job, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementHistory {
    pub node: NodeIdentity,
    pub name: String,
    pub points: Vec<HistoryPoint>,
}

impl MeasurementHistory {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Rebuilds histories on every call; nothing is kept between queries.
pub struct HistoryAggregator<C, B> {
    catalog: C,
    lookup: NodeMeasurementLookup<B>,
}

impl<C, B> HistoryAggregator<C, B>
where
    C: RunCatalog,
    B: RunStoreBackend,
{
    pub fn new(catalog: C, lookup: NodeMeasurementLookup<B>) -> Self {
        Self { catalog, lookup }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn lookup(&self) -> &NodeMeasurementLookup<B> {
        &self.lookup
    }

    pub fn history(&self, name: &str, node: &NodeIdentity, run: &RunKey) -> MeasurementHistory {
        let mut points = Vec::new();
        for info in self.finished_runs(run) {
            if let Some(measurement) = self.lookup.measurement_in_run(&info.key, node, name) {
                points.push(HistoryPoint {
                    run: info,
                    measurement,
                });
            }
        }
        tracing::debug!(
            job = %run.job,
            node = %node,
            name,
            points = points.len(),
            "measurement history assembled"
        );
        MeasurementHistory {
            node: node.clone(),
            name: name.to_string(),
            points,
        }
    }

    /// Histories for every measurement the node authored in `run`, in that
    /// run's measurement order.
    pub fn node_histories(&self, node: &NodeIdentity, run: &RunKey) -> Vec<MeasurementHistory> {
        let Some(set) = self.lookup.node_measurements(run, node) else {
            return Vec::new();
        };
        set.iter()
            .map(|measurement| self.history(&measurement.name, node, run))
            .collect()
    }

    fn finished_runs(&self, run: &RunKey) -> Vec<RunInfo> {
        let mut runs: Vec<RunInfo> = self
            .catalog
            .runs_of_job(&run.job)
            .into_iter()
            .filter(|info| !info.building)
            .collect();
        runs.sort_by_key(|info| info.key.number);
        runs.dedup_by_key(|info| info.key.number);
        runs
    }
}
