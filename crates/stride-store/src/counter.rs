use std::sync::Arc;

use stride_schemas::StepCount;
use tracing::{debug, error};

use crate::kv::{KeyValueStore, StoreError};

/// The cumulative step count, stored as a decimal string under one key.
#[derive(Clone)]
pub struct CounterStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored count, surfacing backend errors.
    ///
    /// Malformed values are not errors; they decode to zero.
    pub async fn try_read(&self) -> Result<StepCount, StoreError> {
        let raw = self.kv.get(&self.key).await?;
        let count = StepCount::from_stored(raw.as_deref());
        debug!(key = %self.key, raw = ?raw, count = count.get(), "read step count");
        Ok(count)
    }

    /// Read the stored count. Any failure resolves to zero.
    pub async fn read(&self) -> StepCount {
        match self.try_read().await {
            Ok(c) => c,
            Err(e) => {
                error!(key = %self.key, error = %e, "step count read failed; using zero");
                StepCount::ZERO
            }
        }
    }

    /// Write the count. Returns `false` (after logging) if the backend failed.
    pub async fn write(&self, count: StepCount) -> bool {
        match self.kv.set(&self.key, &count.to_stored()).await {
            Ok(()) => {
                debug!(key = %self.key, count = count.get(), "persisted step count");
                true
            }
            Err(e) => {
                error!(key = %self.key, count = count.get(), error = %e, "step count write failed");
                false
            }
        }
    }
}
