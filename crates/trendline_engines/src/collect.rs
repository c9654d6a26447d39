#![forbid(unsafe_code)]

use trendline_kernel_contracts::measurement::{RunMeasurementStore, RunMeasurementStoreBuilder};
use trendline_kernel_contracts::result_tree::{OutputCategory, ResultTree};

use crate::attribution::OutputAttribution;
use crate::extractor::OutputExtractor;
use crate::walker::ResultTreeWalker;

/// Turns one finished run's result tree into its measurement store.
///
/// Runs on the finishing run's own thread; holds no shared state.
#[derive(Debug, Clone, Default)]
pub struct RunMeasurementCollector {
    extractor: OutputExtractor,
}

impl RunMeasurementCollector {
    pub fn new(extractor: OutputExtractor) -> Self {
        Self { extractor }
    }

    pub fn collect<T: ResultTree>(&self, tree: &T) -> RunMeasurementStore {
        let nodes = ResultTreeWalker::nodes(tree);
        let attribution = OutputAttribution::build(tree, &nodes);

        let mut builder = RunMeasurementStoreBuilder::new();
        for node in nodes {
            let mut identity = None;
            // primary first so the secondary channel wins on a name clash
            for category in OutputCategory::ALL {
                let Some(text) = attribution.authored_output(tree, node, category) else {
                    continue;
                };
                for measurement in self.extractor.extract(&text) {
                    let identity = identity.get_or_insert_with(|| tree.identity(node));
                    builder.record(identity, measurement);
                }
            }
        }

        let store = builder.build();
        tracing::debug!(
            nodes = store.node_count(),
            measurements = store.measurement_count(),
            suppressed = attribution.suppressed_count(),
            "collected run measurements"
        );
        store
    }
}
