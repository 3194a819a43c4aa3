use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use stride_platform::{BackgroundScheduler, PlatformError, WakeHandler};
use stride_schemas::{SchedulerStatus, TaskOptions, TaskResult};
use tokio::task::JoinHandle;
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process background wake scheduler.
///
/// Wakes are delivered by [`fire`][SimScheduler::fire] (manual) or by
/// [`spawn_ticker`][SimScheduler::spawn_ticker] (periodic). Invocations are
/// serialized: a wake never starts while another is running.
pub struct SimScheduler {
    status: Mutex<SchedulerStatus>,
    handlers: Mutex<HashMap<String, Arc<dyn WakeHandler>>>,
    registered: Mutex<HashMap<String, TaskOptions>>,
    fail_register: AtomicBool,
    register_calls: AtomicU64,
    unregister_calls: AtomicU64,
    wake_lock: tokio::sync::Mutex<()>,
}

impl Default for SimScheduler {
    fn default() -> Self {
        Self::new(SchedulerStatus::Available)
    }
}

impl SimScheduler {
    pub fn new(status: SchedulerStatus) -> Self {
        Self {
            status: Mutex::new(status),
            handlers: Mutex::new(HashMap::new()),
            registered: Mutex::new(HashMap::new()),
            fail_register: AtomicBool::new(false),
            register_calls: AtomicU64::new(0),
            unregister_calls: AtomicU64::new(0),
            wake_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn set_status(&self, status: SchedulerStatus) {
        *lock(&self.status) = status;
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    /// Mark a task registered without going through the engine, as if a
    /// previous process had registered it.
    pub fn preregister(&self, task_id: &str, options: TaskOptions) {
        lock(&self.registered).insert(task_id.to_string(), options);
    }

    pub fn is_registered(&self, task_id: &str) -> bool {
        lock(&self.registered).contains_key(task_id)
    }

    pub fn options(&self, task_id: &str) -> Option<TaskOptions> {
        lock(&self.registered).get(task_id).copied()
    }

    pub fn is_defined(&self, task_id: &str) -> bool {
        lock(&self.handlers).contains_key(task_id)
    }

    pub fn register_calls(&self) -> u64 {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> u64 {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    /// Deliver one wake. `None` if the task is not registered or has no
    /// handler.
    pub async fn fire(&self, task_id: &str) -> Option<TaskResult> {
        if !self.is_registered(task_id) {
            return None;
        }
        let handler = lock(&self.handlers).get(task_id).cloned()?;
        let _serial = self.wake_lock.lock().await;
        debug!(task_id, "background wake");
        Some(handler.on_wake().await)
    }

    /// Wake `task_id` every `interval` while it is registered.
    pub fn spawn_ticker(self: &Arc<Self>, task_id: &str, interval: Duration) -> JoinHandle<()> {
        let sched = Arc::clone(self);
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                // Unregistered ticks are skipped, not fatal.
                let _ = sched.fire(&task_id).await;
            }
        })
    }
}

#[async_trait]
impl BackgroundScheduler for SimScheduler {
    async fn status(&self) -> Result<SchedulerStatus, PlatformError> {
        Ok(*lock(&self.status))
    }

    fn define_task(&self, task_id: &str, handler: Arc<dyn WakeHandler>) {
        lock(&self.handlers).insert(task_id.to_string(), handler);
    }

    async fn register_task(
        &self,
        task_id: &str,
        options: TaskOptions,
    ) -> Result<(), PlatformError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(PlatformError::Refused("simulated register failure".to_string()));
        }
        if !lock(&self.status).is_available() {
            return Err(PlatformError::Unavailable("background wake disabled".to_string()));
        }
        lock(&self.registered).insert(task_id.to_string(), options);
        Ok(())
    }

    async fn unregister_task(&self, task_id: &str) -> Result<(), PlatformError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.registered).remove(task_id) {
            Some(_) => Ok(()),
            None => Err(PlatformError::Refused(format!("task {task_id} not registered"))),
        }
    }

    async fn is_task_registered(&self, task_id: &str) -> Result<bool, PlatformError> {
        Ok(self.is_registered(task_id))
    }
}
