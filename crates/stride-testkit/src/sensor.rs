use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stride_platform::{PlatformError, StepSensor, Watch};
use stride_schemas::{DeltaEvent, PermissionStatus, StepWindow, SubscriptionId};
use tokio::sync::mpsc;
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct OpenSubscription {
    tx: mpsc::UnboundedSender<DeltaEvent>,
    /// Steps since this subscription opened.
    steps: u64,
}

/// Scriptable pedometer.
///
/// Every open subscription counts independently from zero, like a real
/// platform step stream. `walk(n)` advances all of them and emits one
/// cumulative event on each.
pub struct SimSensor {
    available: bool,
    history: bool,
    history_steps: AtomicU64,
    permission: Mutex<PermissionStatus>,
    prompt_answers: Mutex<VecDeque<PermissionStatus>>,
    prompts: AtomicU64,
    fail_watch: AtomicBool,
    next_id: AtomicU64,
    open: Mutex<BTreeMap<SubscriptionId, OpenSubscription>>,
    watch_calls: AtomicU64,
    releases: Mutex<Vec<SubscriptionId>>,
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSensor {
    /// Available, permission granted, no step history.
    pub fn new() -> Self {
        Self {
            available: true,
            history: false,
            history_steps: AtomicU64::new(0),
            permission: Mutex::new(PermissionStatus::granted()),
            prompt_answers: Mutex::new(VecDeque::new()),
            prompts: AtomicU64::new(0),
            fail_watch: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            open: Mutex::new(BTreeMap::new()),
            watch_calls: AtomicU64::new(0),
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Platform that keeps history; `steps` were taken in the last day.
    pub fn with_history(mut self, steps: u64) -> Self {
        self.history = true;
        self.history_steps = AtomicU64::new(steps);
        self
    }

    pub fn with_permission(self, status: PermissionStatus) -> Self {
        *lock(&self.permission) = status;
        self
    }

    /// Answers returned by successive prompts. Once exhausted, a prompt
    /// leaves the permission unchanged.
    pub fn with_prompt_answers(self, answers: Vec<PermissionStatus>) -> Self {
        *lock(&self.prompt_answers) = answers.into();
        self
    }

    pub fn set_fail_watch(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::SeqCst);
    }

    /// Take `steps` steps.
    pub fn walk(&self, steps: u64) {
        self.history_steps.fetch_add(steps, Ordering::SeqCst);
        let mut open = lock(&self.open);
        for (id, sub) in open.iter_mut() {
            sub.steps += steps;
            if sub.tx.send(DeltaEvent::new(sub.steps)).is_err() {
                debug!(subscription = %id, "listener gone");
            }
        }
    }

    /// Take `steps` steps seen only by subscription `id`, as when the OS
    /// has suspended every other listener.
    pub fn walk_for(&self, id: SubscriptionId, steps: u64) {
        self.history_steps.fetch_add(steps, Ordering::SeqCst);
        if let Some(sub) = lock(&self.open).get_mut(&id) {
            sub.steps += steps;
            let _ = sub.tx.send(DeltaEvent::new(sub.steps));
        }
    }

    pub fn active_subscriptions(&self) -> Vec<SubscriptionId> {
        lock(&self.open).keys().copied().collect()
    }

    /// Every `release` call received, including repeats.
    pub fn releases(&self) -> Vec<SubscriptionId> {
        lock(&self.releases).clone()
    }

    pub fn watch_calls(&self) -> u64 {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> u64 {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepSensor for SimSensor {
    async fn is_available(&self) -> Result<bool, PlatformError> {
        Ok(self.available)
    }

    async fn get_permissions(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(*lock(&self.permission))
    }

    async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let mut current = lock(&self.permission);
        if let Some(answer) = lock(&self.prompt_answers).pop_front() {
            *current = answer;
        }
        Ok(*current)
    }

    fn supports_history(&self) -> bool {
        self.history
    }

    async fn get_step_count(&self, _window: StepWindow) -> Result<u64, PlatformError> {
        if !self.history {
            return Err(PlatformError::Unavailable(
                "simulated sensor keeps no history".to_string(),
            ));
        }
        Ok(self.history_steps.load(Ordering::SeqCst))
    }

    fn watch(&self) -> Result<Watch, PlatformError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_watch.load(Ordering::SeqCst) {
            return Err(PlatformError::Internal("simulated watch failure".to_string()));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let (tx, events) = mpsc::unbounded_channel();
        lock(&self.open).insert(id, OpenSubscription { tx, steps: 0 });
        Ok(Watch { id, events })
    }

    fn release(&self, id: SubscriptionId) {
        lock(&self.releases).push(id);
        // Dropping the sender ends the subscriber's stream.
        lock(&self.open).remove(&id);
    }
}
