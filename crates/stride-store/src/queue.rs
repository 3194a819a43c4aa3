//! Single-writer persistence queue for the step count key.
//!
//! Event handlers must not block on storage, but writes must land in the
//! order the events produced them: a slow earlier write must never overtake
//! a later one. All writes for the key therefore go through one task that
//! retires commands strictly in arrival order.
//!
//! Baseline reads go through the same task, so a read issued after a write
//! always observes that write (or the store's failure to take it).
//!
//! Writes are held back until the task has read the stored total once, so a
//! count restarted from a failed read can never overwrite a higher total.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stride_schemas::StepCount;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::counter::CounterStore;
use crate::watermark::{CountWatermark, WriteFreshness};

enum Command {
    Write(StepCount),
    Read(oneshot::Sender<StepCount>),
    Flush(oneshot::Sender<()>),
}

/// Counters for what the writer task did with queued writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub written: u64,
    pub failed: u64,
    pub skipped_stale: u64,
}

#[derive(Debug, Default)]
struct StatCells {
    written: AtomicU64,
    failed: AtomicU64,
    skipped_stale: AtomicU64,
}

/// Cloneable handle to the writer task. The task exits once every handle
/// has been dropped and the remaining commands are drained.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<StatCells>,
    key: Arc<str>,
}

impl PersistQueue {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(store: CounterStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(StatCells::default());
        let key: Arc<str> = Arc::from(store.key());
        tokio::spawn(run_writer(store, rx, Arc::clone(&stats)));
        Self { tx, stats, key }
    }

    /// Queue a write and return immediately.
    pub fn enqueue(&self, count: StepCount) {
        if self.tx.send(Command::Write(count)).is_err() {
            warn!(key = %self.key, count = count.get(), "persist queue closed; write dropped");
        }
    }

    /// Read the stored total after every previously queued write has retired.
    ///
    /// Falls back to the last total this queue knows was stored, or zero.
    pub async fn read_baseline(&self) -> StepCount {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Read(reply)).is_err() {
            warn!(key = %self.key, "persist queue closed; baseline read as zero");
            return StepCount::ZERO;
        }
        rx.await.unwrap_or(StepCount::ZERO)
    }

    /// Wait until every previously queued write has retired.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            written: self.stats.written.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            skipped_stale: self.stats.skipped_stale.load(Ordering::Relaxed),
        }
    }
}

async fn run_writer(
    store: CounterStore,
    mut rx: mpsc::UnboundedReceiver<Command>,
    stats: Arc<StatCells>,
) {
    let mut wm = CountWatermark::new();
    // Whether `wm` reflects the stored total. Until it does, every write
    // first reads the store.
    let mut anchored = false;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Write(count) => {
                if !anchored {
                    match store.try_read().await {
                        Ok(stored) => {
                            wm.observe(stored);
                            anchored = true;
                        }
                        Err(e) => {
                            // Without the stored total the write could lower it.
                            warn!(
                                key = %store.key(),
                                count = count.get(),
                                error = %e,
                                "store unreadable; write withheld"
                            );
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }
                }
                match wm.check(count) {
                    WriteFreshness::Stale { watermark, got } => {
                        debug!(
                            key = %store.key(),
                            watermark = watermark.get(),
                            got = got.get(),
                            "skipping write below persisted total"
                        );
                        stats.skipped_stale.fetch_add(1, Ordering::Relaxed);
                    }
                    WriteFreshness::Fresh => {
                        if store.write(count).await {
                            wm.advance(count);
                            stats.written.fetch_add(1, Ordering::Relaxed);
                        } else {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            Command::Read(reply) => {
                let baseline = match store.try_read().await {
                    Ok(c) => {
                        wm.observe(c);
                        anchored = true;
                        c
                    }
                    Err(e) => {
                        anchored = false;
                        let fallback = wm.last().unwrap_or(StepCount::ZERO);
                        error!(
                            key = %store.key(),
                            error = %e,
                            fallback = fallback.get(),
                            "baseline read failed; using last known total"
                        );
                        fallback
                    }
                };
                let _ = reply.send(baseline);
            }
            Command::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }

    debug!(key = %store.key(), "persist queue drained");
}
