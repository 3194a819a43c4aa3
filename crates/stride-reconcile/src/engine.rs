//! Foreground activation.
//!
//! `StepEngine::activate` runs the kickstart sequence once:
//!
//! 1. Sensor availability (unavailable → idle activation, no error).
//! 2. Scheduler status (errors degrade to "unavailable").
//! 3. Permission negotiation (denied → `EngineError::PermissionDenied`).
//! 4. Mode A (snapshot) or mode B (accumulation).
//!
//! The returned [`Activation`] owns the foreground subscription. Dropping it
//! or calling [`Activation::deactivate`] releases the subscription.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stride_platform::{BackgroundScheduler, StepSensor};
use stride_schemas::{
    ContextId, DeltaEvent, SchedulerStatus, StepCount, StepWindow, SubscriptionId, TaskOptions,
    BACKGROUND_TASK_ID,
};
use stride_store::{CounterStore, PersistQueue};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::background::BackgroundCounter;
use crate::error::EngineError;
use crate::permission::{negotiate_permission, PermissionPolicy};
use crate::registry::{Lease, SubscriptionRegistry};
use crate::total::{reconcile_total, AcquisitionMode};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub task_id: String,
    pub task_options: TaskOptions,
    pub permission: PermissionPolicy,
    /// Snapshot mode queries `[now - lookback, now)`.
    pub snapshot_lookback: chrono::Duration,
    /// Keep a live subscription after the snapshot for real-time updates.
    pub snapshot_live_updates: bool,
    /// How long one background wake listens for events.
    pub background_tick_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_id: BACKGROUND_TASK_ID.to_string(),
            task_options: TaskOptions::default(),
            permission: PermissionPolicy::default(),
            snapshot_lookback: chrono::Duration::hours(24),
            snapshot_live_updates: false,
            background_tick_window: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

/// One foreground activation.
pub struct Activation {
    mode: Option<AcquisitionMode>,
    baseline: StepCount,
    lease: Option<Lease>,
    pump: Option<JoinHandle<()>>,
}

impl Activation {
    fn idle() -> Self {
        Self {
            mode: None,
            baseline: StepCount::ZERO,
            lease: None,
            pump: None,
        }
    }

    fn finished(mode: AcquisitionMode, baseline: StepCount) -> Self {
        Self {
            mode: Some(mode),
            baseline,
            lease: None,
            pump: None,
        }
    }

    fn live(mode: AcquisitionMode, baseline: StepCount, lease: Lease, pump: JoinHandle<()>) -> Self {
        Self {
            mode: Some(mode),
            baseline,
            lease: Some(lease),
            pump: Some(pump),
        }
    }

    /// `None` when the sensor was unavailable and nothing ran.
    pub fn mode(&self) -> Option<AcquisitionMode> {
        self.mode
    }

    /// Baseline (accumulation) or snapshot value the display started from.
    pub fn baseline(&self) -> StepCount {
        self.baseline
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.lease.as_ref().map(Lease::id)
    }

    pub fn is_idle(&self) -> bool {
        self.mode.is_none()
    }

    /// Release the subscription and wait for already-delivered events to be
    /// applied. The sensor ends the stream on release, which stops the pump.
    pub async fn deactivate(mut self) {
        if let Some(lease) = self.lease.take() {
            lease.release();
        }
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                warn!(error = %e, "step pump ended abnormally");
            }
        }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        // Lease drops with us and releases; the pump must not outlive it.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct StepEngine {
    sensor: Arc<dyn StepSensor>,
    scheduler: Arc<dyn BackgroundScheduler>,
    queue: PersistQueue,
    registry: Arc<SubscriptionRegistry>,
    display: Arc<watch::Sender<StepCount>>,
    config: EngineConfig,
}

impl StepEngine {
    /// Build the engine and define the background task with the scheduler.
    ///
    /// Must be called inside a tokio runtime (spawns the persistence writer).
    pub fn new(
        sensor: Arc<dyn StepSensor>,
        scheduler: Arc<dyn BackgroundScheduler>,
        store: CounterStore,
        config: EngineConfig,
    ) -> Self {
        let queue = PersistQueue::spawn(store);
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&sensor)));
        let (display, _rx) = watch::channel(StepCount::ZERO);

        let background = BackgroundCounter::new(
            queue.clone(),
            Arc::clone(&registry),
            config.background_tick_window,
        );
        scheduler.define_task(&config.task_id, Arc::new(background));

        Self {
            sensor,
            scheduler,
            queue,
            registry,
            display: Arc::new(display),
            config,
        }
    }

    /// Live readout of the displayed count.
    pub fn display(&self) -> watch::Receiver<StepCount> {
        self.display.subscribe()
    }

    pub fn current(&self) -> StepCount {
        *self.display.borrow()
    }

    pub fn queue(&self) -> &PersistQueue {
        &self.queue
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the kickstart sequence.
    pub async fn activate(&self) -> Result<Activation, EngineError> {
        let available = match self.sensor.is_available().await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "sensor availability check failed; treating as unavailable");
                false
            }
        };
        let scheduler_status = self.scheduler_status().await;

        if !available {
            info!("step sensor unavailable; nothing to count");
            return Ok(Activation::idle());
        }

        if let Err(e) = negotiate_permission(self.sensor.as_ref(), self.config.permission).await {
            error!(error = %e, "Could not get permission.");
            return Err(e);
        }

        let mode = AcquisitionMode::select(self.sensor.supports_history());
        info!(mode = mode.as_str(), "activating step acquisition");
        match mode {
            AcquisitionMode::Snapshot => self.activate_snapshot().await,
            AcquisitionMode::Accumulation => self.activate_accumulation(scheduler_status).await,
        }
    }

    /// Tear down the background task and any background subscription.
    ///
    /// Returns `true` if the scheduler accepted the unregistration.
    pub async fn unregister_background(&self) -> bool {
        if self.registry.release_context(ContextId::Background) {
            info!("released live background subscription");
        }
        match self.scheduler.unregister_task(&self.config.task_id).await {
            Ok(()) => {
                info!(task_id = %self.config.task_id, "unregistered background step count");
                true
            }
            Err(e) => {
                warn!(task_id = %self.config.task_id, error = %e, "background unregister failed");
                false
            }
        }
    }

    async fn scheduler_status(&self) -> SchedulerStatus {
        match self.scheduler.status().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "scheduler status check failed; treating as unavailable");
                SchedulerStatus::Unavailable
            }
        }
    }

    async fn activate_snapshot(&self) -> Result<Activation, EngineError> {
        let window = StepWindow::trailing(Utc::now(), self.config.snapshot_lookback);
        let snapshot = StepCount::new(self.sensor.get_step_count(window).await?);
        self.display.send_replace(snapshot);
        info!(steps = snapshot.get(), "snapshot step count");

        if !self.config.snapshot_live_updates {
            return Ok(Activation::finished(AcquisitionMode::Snapshot, snapshot));
        }

        let (lease, events) = self.registry.open(ContextId::Foreground)?;
        let pump = tokio::spawn(pump_events(
            snapshot,
            events,
            Arc::clone(&self.display),
            None,
        ));
        Ok(Activation::live(AcquisitionMode::Snapshot, snapshot, lease, pump))
    }

    async fn activate_accumulation(
        &self,
        scheduler_status: SchedulerStatus,
    ) -> Result<Activation, EngineError> {
        let baseline = self.queue.read_baseline().await;
        self.display.send_replace(baseline);
        info!(baseline = baseline.get(), "loaded persisted baseline");

        if scheduler_status.is_available() {
            self.reregister_background().await;
        } else {
            info!(status = ?scheduler_status, "background wake unavailable; foreground-only counting");
        }

        let (lease, events) = self.registry.open(ContextId::Foreground)?;
        let pump = tokio::spawn(pump_events(
            baseline,
            events,
            Arc::clone(&self.display),
            Some(self.queue.clone()),
        ));
        Ok(Activation::live(
            AcquisitionMode::Accumulation,
            baseline,
            lease,
            pump,
        ))
    }

    /// Unregister if registered, then register. Never leaves two background
    /// subscriptions alive.
    async fn reregister_background(&self) {
        let task_id = &self.config.task_id;

        match self.scheduler.is_task_registered(task_id).await {
            Ok(true) => {
                self.unregister_background().await;
            }
            Ok(false) => {}
            Err(e) => warn!(task_id = %task_id, error = %e, "could not query background registration"),
        }

        info!(task_id = %task_id, "registering background step count");
        if let Err(e) = self
            .scheduler
            .register_task(task_id, self.config.task_options)
            .await
        {
            warn!(task_id = %task_id, error = %e, "background registration failed; foreground-only counting");
        }
    }
}

/// Apply events in arrival order until the stream ends.
///
/// The write is queued before the display changes, so anyone who has seen a
/// total on the display can flush the queue and find it stored.
async fn pump_events(
    baseline: StepCount,
    mut events: mpsc::UnboundedReceiver<DeltaEvent>,
    display: Arc<watch::Sender<StepCount>>,
    persist: Option<PersistQueue>,
) {
    while let Some(ev) = events.recv().await {
        let total = reconcile_total(baseline, ev);
        debug!(steps = ev.steps, total = total.get(), "step event");
        if let Some(queue) = &persist {
            queue.enqueue(total);
        }
        display.send_replace(total);
    }
}
