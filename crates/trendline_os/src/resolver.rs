#![forbid(unsafe_code)]

use std::sync::Arc;

use trendline_kernel_contracts::measurement::{Measurement, NodeIdentity, NodeMeasurements};
use trendline_kernel_contracts::run::RunKey;
use trendline_storage::backend::RunStoreBackend;
use trendline_storage::run_cache::RunStoreCache;

/// Per-node view into a run's persisted measurements.
pub struct NodeMeasurementLookup<B> {
    cache: Arc<RunStoreCache<B>>,
}

impl<B> Clone for NodeMeasurementLookup<B> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<B: RunStoreBackend> NodeMeasurementLookup<B> {
    pub fn new(cache: Arc<RunStoreCache<B>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &RunStoreCache<B> {
        &self.cache
    }

    /// The node's measurements in `run`; `None` when the node authored nothing there.
    pub fn node_measurements(
        &self,
        run: &RunKey,
        node: &NodeIdentity,
    ) -> Option<NodeMeasurements> {
        self.cache
            .load(run)
            .node(node)
            .filter(|set| !set.is_empty())
            .cloned()
    }

    pub fn measurement_in_run(
        &self,
        run: &RunKey,
        node: &NodeIdentity,
        name: &str,
    ) -> Option<Measurement> {
        self.cache.load(run).measurement(node, name).cloned()
    }

    /// Like [`Self::measurement_in_run`], also accepting the URL-safe name.
    pub fn measurement_by_url_name(
        &self,
        run: &RunKey,
        node: &NodeIdentity,
        url_name: &str,
    ) -> Option<Measurement> {
        self.cache
            .load(run)
            .node(node)?
            .get_by_url_name(url_name)
            .cloned()
    }
}
