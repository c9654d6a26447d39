#![forbid(unsafe_code)]

use std::sync::Arc;

use trendline_engines::collect::RunMeasurementCollector;
use trendline_kernel_contracts::measurement::RunMeasurementStore;
use trendline_kernel_contracts::result_tree::ResultTree;
use trendline_kernel_contracts::run::RunKey;
use trendline_kernel_contracts::{ContractViolation, Validate};
use trendline_storage::backend::RunStoreBackend;
use trendline_storage::run_cache::RunStoreCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementWiringConfig {
    pub collection_enabled: bool,
}

impl MeasurementWiringConfig {
    pub fn mvp_v1(collection_enabled: bool) -> Self {
        Self { collection_enabled }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementPublishOutcome {
    NotInvokedDisabled,
    /// The walk found nothing; no artifact exists for the run.
    NothingFound,
    Recorded {
        run: RunKey,
        nodes: usize,
        measurements: usize,
    },
    /// Collected and served from memory, but the artifact write failed.
    RecordedNotPersisted {
        run: RunKey,
        nodes: usize,
        measurements: usize,
        reason: String,
    },
}

pub trait MeasurementCollectionEngine {
    fn collect<T: ResultTree>(&self, tree: &T) -> RunMeasurementStore;
}

impl MeasurementCollectionEngine for RunMeasurementCollector {
    fn collect<T: ResultTree>(&self, tree: &T) -> RunMeasurementStore {
        RunMeasurementCollector::collect(self, tree)
    }
}

/// End-of-run hook: walk the finished run's results once and persist what it authored.
pub struct MeasurementPublisher<E, B> {
    config: MeasurementWiringConfig,
    engine: E,
    cache: Arc<RunStoreCache<B>>,
}

impl<E, B> MeasurementPublisher<E, B>
where
    E: MeasurementCollectionEngine,
    B: RunStoreBackend,
{
    pub fn new(config: MeasurementWiringConfig, engine: E, cache: Arc<RunStoreCache<B>>) -> Self {
        Self {
            config,
            engine,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<RunStoreCache<B>> {
        &self.cache
    }

    pub fn publish<T: ResultTree>(
        &self,
        run: &RunKey,
        tree: &T,
    ) -> Result<MeasurementPublishOutcome, ContractViolation> {
        run.validate()?;

        if !self.config.collection_enabled {
            return Ok(MeasurementPublishOutcome::NotInvokedDisabled);
        }

        let store = self.engine.collect(tree);
        if store.is_empty() {
            tracing::debug!(run = %run, "no measurements authored; nothing recorded");
            return Ok(MeasurementPublishOutcome::NothingFound);
        }

        let nodes = store.node_count();
        let measurements = store.measurement_count();
        match self.cache.commit(run, store) {
            Ok(()) => Ok(MeasurementPublishOutcome::Recorded {
                run: run.clone(),
                nodes,
                measurements,
            }),
            Err(err) => Ok(MeasurementPublishOutcome::RecordedNotPersisted {
                run: run.clone(),
                nodes,
                measurements,
                reason: err.to_string(),
            }),
        }
    }
}
