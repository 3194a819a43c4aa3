use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stride_platform::WakeHandler;
use stride_schemas::{ContextId, TaskResult};
use stride_store::PersistQueue;
use tracing::{error, info};

use crate::registry::SubscriptionRegistry;
use crate::total::reconcile_total;

/// Handler for the periodic background wake.
///
/// One tick: read the baseline fresh, subscribe under the background
/// context, persist `baseline + steps` for every event that arrives within
/// the tick window, then release the subscription. Registration is the
/// foreground's job and is never touched here.
pub struct BackgroundCounter {
    queue: PersistQueue,
    registry: Arc<SubscriptionRegistry>,
    tick_window: Duration,
}

impl BackgroundCounter {
    pub fn new(
        queue: PersistQueue,
        registry: Arc<SubscriptionRegistry>,
        tick_window: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            tick_window,
        }
    }

    pub async fn tick(&self) -> TaskResult {
        let baseline = self.queue.read_baseline().await;

        let (lease, mut events) = match self.registry.open(ContextId::Background) {
            Ok(opened) => opened,
            Err(e) => {
                error!(error = %e, "background tick could not subscribe");
                return TaskResult::Failed;
            }
        };

        let deadline = tokio::time::sleep(self.tick_window);
        tokio::pin!(deadline);

        let mut received = 0u64;
        let mut last = baseline;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                ev = events.recv() => match ev {
                    Some(ev) => {
                        last = reconcile_total(baseline, ev);
                        self.queue.enqueue(last);
                        received += 1;
                    }
                    // Released from elsewhere (foreground took over).
                    None => break,
                },
            }
        }

        lease.release();
        self.queue.flush().await;

        info!(
            baseline = baseline.get(),
            total = last.get(),
            events = received,
            "background tick complete"
        );
        TaskResult::NewData
    }
}

#[async_trait]
impl WakeHandler for BackgroundCounter {
    async fn on_wake(&self) -> TaskResult {
        self.tick().await
    }
}
