//! stride-testkit
//!
//! Simulated platform for tests and the `stride simulate` command:
//! a scriptable step sensor, an in-process background scheduler and a store
//! wrapper with failure injection.

use std::sync::Arc;
use std::time::Duration;

use stride_reconcile::{EngineConfig, StepEngine};
use stride_schemas::{StepCount, STEP_COUNT_KEY};
use stride_store::{CounterStore, KeyValueStore};
use tokio::sync::watch;

mod scheduler;
mod sensor;
mod store;

pub use scheduler::SimScheduler;
pub use sensor::SimSensor;
pub use store::FlakyStore;

/// A simulated device: sensor, scheduler and storage shared across engine
/// instances. Building a second engine over the same rig models an app
/// restart.
pub struct SimRig<S: KeyValueStore + 'static = FlakyStore> {
    pub sensor: Arc<SimSensor>,
    pub scheduler: Arc<SimScheduler>,
    pub store: Arc<S>,
    key: String,
}

impl SimRig<FlakyStore> {
    /// Available sensor, available scheduler, empty store.
    pub fn new() -> Self {
        Self::with(SimSensor::new(), SimScheduler::default(), FlakyStore::new())
    }
}

impl Default for SimRig<FlakyStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyValueStore + 'static> SimRig<S> {
    pub fn with(sensor: SimSensor, scheduler: SimScheduler, store: S) -> Self {
        Self {
            sensor: Arc::new(sensor),
            scheduler: Arc::new(scheduler),
            store: Arc::new(store),
            key: STEP_COUNT_KEY.to_string(),
        }
    }

    /// Persist under `key` instead of [`STEP_COUNT_KEY`].
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// Engine over the rig.
    pub fn engine(&self, config: EngineConfig) -> StepEngine {
        let kv: Arc<dyn KeyValueStore> = self.store.clone();
        StepEngine::new(
            self.sensor.clone(),
            self.scheduler.clone(),
            CounterStore::new(kv, self.key.clone()),
            config,
        )
    }
}

/// Wait until the display shows `expected`, or `within` elapses.
///
/// Returns the last value seen.
pub async fn wait_for_count(
    display: &mut watch::Receiver<StepCount>,
    expected: StepCount,
    within: Duration,
) -> StepCount {
    let _ = tokio::time::timeout(within, display.wait_for(|c| *c == expected)).await;
    *display.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_expected_count_once_shown() {
        let (tx, mut rx) = watch::channel(StepCount::ZERO);
        tx.send_replace(StepCount::new(9));
        let seen = wait_for_count(&mut rx, StepCount::new(9), Duration::from_secs(1)).await;
        assert_eq!(seen, StepCount::new(9));
    }

    #[tokio::test]
    async fn wait_times_out_with_last_count() {
        let (tx, mut rx) = watch::channel(StepCount::ZERO);
        tx.send_replace(StepCount::new(4));
        let seen = wait_for_count(&mut rx, StepCount::new(9), Duration::from_millis(20)).await;
        assert_eq!(seen, StepCount::new(4));
    }
}
