//! Per-context subscription ownership.
//!
//! Each acquisition context holds at most one live subscription. The owning
//! flow keeps a [`Lease`]; the registry keeps `context → subscription id` so
//! one flow can tear down another's subscription (the foreground does this
//! to the background context when it re-registers the background task).
//!
//! Whoever removes an id from the map is the one that calls
//! `StepSensor::release`, so the sensor sees exactly one release per
//! subscription no matter how many paths race to drop it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stride_platform::{PlatformError, StepSensor};
use stride_schemas::{ContextId, DeltaEvent, SubscriptionId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct SubscriptionRegistry {
    sensor: Arc<dyn StepSensor>,
    active: Mutex<HashMap<ContextId, SubscriptionId>>,
}

impl SubscriptionRegistry {
    pub fn new(sensor: Arc<dyn StepSensor>) -> Self {
        Self {
            sensor,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<ContextId, SubscriptionId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a subscription for `ctx`, releasing any subscription it already held.
    pub fn open(
        self: &Arc<Self>,
        ctx: ContextId,
    ) -> Result<(Lease, mpsc::UnboundedReceiver<DeltaEvent>), PlatformError> {
        let watch = self.sensor.watch()?;
        let previous = self.map().insert(ctx, watch.id);

        if let Some(prev) = previous {
            warn!(context = %ctx, replaced = %prev, "context already subscribed; releasing previous");
            self.sensor.release(prev);
        }
        debug!(context = %ctx, subscription = %watch.id, "subscribed to step stream");

        let lease = Lease {
            registry: Arc::clone(self),
            ctx,
            id: watch.id,
            released: false,
        };
        Ok((lease, watch.events))
    }

    /// Release `id` if it is still the live subscription of `ctx`.
    fn release(&self, ctx: ContextId, id: SubscriptionId) -> bool {
        let removed = {
            let mut map = self.map();
            if map.get(&ctx) == Some(&id) {
                map.remove(&ctx);
                true
            } else {
                false
            }
        };
        if removed {
            self.sensor.release(id);
            debug!(context = %ctx, subscription = %id, "released step subscription");
        }
        removed
    }

    /// Release whatever subscription `ctx` currently holds.
    pub fn release_context(&self, ctx: ContextId) -> bool {
        let removed = self.map().remove(&ctx);
        match removed {
            Some(id) => {
                self.sensor.release(id);
                debug!(context = %ctx, subscription = %id, "released step subscription");
                true
            }
            None => false,
        }
    }

    pub fn active(&self, ctx: ContextId) -> Option<SubscriptionId> {
        self.map().get(&ctx).copied()
    }

    pub fn active_count(&self) -> usize {
        self.map().len()
    }
}

/// Ownership of one live subscription. Releases on drop.
pub struct Lease {
    registry: Arc<SubscriptionRegistry>,
    ctx: ContextId,
    id: SubscriptionId,
    released: bool,
}

impl Lease {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn context(&self) -> ContextId {
        self.ctx
    }

    /// Release now. Returns `false` if another path already released it.
    pub fn release(mut self) -> bool {
        self.release_once()
    }

    fn release_once(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.registry.release(self.ctx, self.id)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release_once();
    }
}
