#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use trendline_kernel_contracts::measurement::RunMeasurementStore;
use trendline_kernel_contracts::run::RunKey;
use trendline_kernel_contracts::{ContractViolation, Validate};

use crate::backend::RunStoreBackend;
use crate::codec::RunStoreCodec;
use crate::config::{RunStoreConfig, MAX_CACHE_CAPACITY};
use crate::StorageError;

type SharedStore = Arc<RunMeasurementStore>;

#[derive(Debug, Default)]
struct RunSlot {
    store: Mutex<Option<SharedStore>>,
    last_access: AtomicU64,
    /// Callers between `slot()` and the end of their load or commit. Only
    /// raised under the slot table lock.
    pins: AtomicUsize,
}

impl RunSlot {
    fn lock(&self) -> MutexGuard<'_, Option<SharedStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }
}

/// Keeps a slot in the table for as long as a caller works on it.
struct SlotPin {
    slot: Arc<RunSlot>,
}

impl Deref for SlotPin {
    type Target = RunSlot;

    fn deref(&self) -> &RunSlot {
        &self.slot
    }
}

impl Drop for SlotPin {
    fn drop(&mut self) {
        self.slot.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct CacheState {
    slots: BTreeMap<RunKey, Arc<RunSlot>>,
    tick: u64,
}

/// Bounded, recency-evicted map from run to its materialized measurement store.
///
/// Each run owns a slot whose lock covers load-or-materialize and the commit
/// write, so concurrent first readers share one backend read and a reader never
/// observes a store that is still being written. The slot table lock is only
/// held to find or create a slot; backend I/O happens under the slot lock alone.
/// A slot stays pinned from the moment a load or commit obtains it until that
/// call returns, and pinned slots are never evicted.
pub struct RunStoreCache<B> {
    backend: B,
    codec: RunStoreCodec,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<B: RunStoreBackend> RunStoreCache<B> {
    pub fn new(backend: B, capacity: usize) -> Result<Self, ContractViolation> {
        if !(1..=MAX_CACHE_CAPACITY).contains(&capacity) {
            return Err(ContractViolation::InvalidRange {
                field: "run_store_cache.capacity",
                min: 1.0,
                max: MAX_CACHE_CAPACITY as f64,
                got: capacity as f64,
            });
        }
        Ok(Self {
            backend,
            codec: RunStoreCodec,
            capacity,
            state: Mutex::new(CacheState::default()),
        })
    }

    pub fn from_config(backend: B, config: &RunStoreConfig) -> Result<Self, ContractViolation> {
        config.validate()?;
        Self::new(backend, config.cache_capacity)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The run's store, materialized from the backend on first access.
    ///
    /// Never fails: a missing, unreadable or corrupt artifact yields an empty
    /// store, which stays cached until the slot is evicted.
    pub fn load(&self, run: &RunKey) -> SharedStore {
        let slot = self.slot(run);
        let mut guard = slot.lock();
        if let Some(store) = guard.as_ref() {
            return Arc::clone(store);
        }
        let store = Arc::new(self.materialize(run));
        *guard = Some(Arc::clone(&store));
        store
    }

    /// Persists a freshly collected store and installs it as the run's snapshot.
    ///
    /// An empty store is installed without touching the backend. When the
    /// write fails the store is still installed and lives only as long as the
    /// slot does. A run that already has an artifact keeps its current
    /// snapshot; the refused store is discarded.
    pub fn commit(&self, run: &RunKey, store: RunMeasurementStore) -> Result<(), StorageError> {
        let slot = self.slot(run);
        let mut guard = slot.lock();
        let written = if store.is_empty() {
            Ok(())
        } else {
            self.codec
                .encode(&store)
                .and_then(|bytes| self.backend.write(run, &bytes))
        };
        match &written {
            Ok(()) => tracing::info!(
                run = %run,
                nodes = store.node_count(),
                measurements = store.measurement_count(),
                "run measurements committed"
            ),
            Err(StorageError::AlreadyCommitted { .. }) => {
                tracing::warn!(run = %run, "run already committed; keeping persisted store")
            }
            Err(err) => tracing::error!(
                run = %run,
                error = %err,
                "run measurements not persisted; keeping in-memory copy"
            ),
        }
        if !matches!(written, Err(StorageError::AlreadyCommitted { .. })) {
            *guard = Some(Arc::new(store));
        }
        written
    }

    /// Drops the run's materialized store; the next `load` reads the backend
    /// again. A slot in use by a load or commit stays, and `false` is returned.
    pub fn evict(&self, run: &RunKey) -> bool {
        let mut state = self.state_lock();
        match state.slots.get(run) {
            Some(slot) if !slot.is_pinned() => state.slots.remove(run).is_some(),
            _ => false,
        }
    }

    /// Drops every slot not currently in use.
    pub fn clear(&self) {
        self.state_lock().slots.retain(|_, slot| slot.is_pinned());
    }

    pub fn len(&self) -> usize {
        self.state_lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, run: &RunKey) -> bool {
        self.state_lock().slots.contains_key(run)
    }

    fn state_lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, run: &RunKey) -> SlotPin {
        let mut state = self.state_lock();
        state.tick += 1;
        let tick = state.tick;
        let slot = Arc::clone(state.slots.entry(run.clone()).or_default());
        slot.last_access.store(tick, Ordering::Relaxed);
        slot.pins.fetch_add(1, Ordering::AcqRel);
        let pin = SlotPin { slot };
        evict_over_capacity(&mut state, self.capacity);
        pin
    }

    fn materialize(&self, run: &RunKey) -> RunMeasurementStore {
        let bytes = match self.backend.read(run) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(run = %run, "no persisted measurements for run");
                return RunMeasurementStore::empty();
            }
            Err(err) => {
                tracing::warn!(run = %run, error = %err, "run store unreadable; using empty store");
                return RunMeasurementStore::empty();
            }
        };
        match self.codec.decode(&bytes) {
            Ok(store) => {
                tracing::debug!(run = %run, nodes = store.node_count(), "run store materialized");
                store
            }
            Err(err) => {
                tracing::warn!(run = %run, error = %err, "run store corrupt; using empty store");
                RunMeasurementStore::empty()
            }
        }
    }
}

fn evict_over_capacity(state: &mut CacheState, capacity: usize) {
    while state.slots.len() > capacity {
        let victim = state
            .slots
            .iter()
            .filter(|(_, slot)| !slot.is_pinned())
            .min_by_key(|(_, slot)| slot.last_access.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());
        let Some(victim) = victim else {
            break;
        };
        state.slots.remove(&victim);
        tracing::trace!(run = %victim, "run store evicted");
    }
}
