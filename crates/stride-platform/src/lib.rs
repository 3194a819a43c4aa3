//! Platform boundary for step acquisition.
//!
//! This crate defines **only** the capabilities the reconciliation engine
//! consumes from the host platform: the motion sensor (availability,
//! permission, historical query, live subscription) and the background wake
//! scheduler. No concrete platform bindings belong here; the simulated
//! platform lives in `stride-testkit`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use stride_schemas::{
    DeltaEvent, PermissionStatus, SchedulerStatus, StepWindow, SubscriptionId, TaskOptions,
    TaskResult,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a platform capability may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The capability is not present on this device.
    Unavailable(String),
    /// The platform refused the call (permission, policy, quota).
    Refused(String),
    /// The call failed for any other platform-side reason.
    Internal(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Unavailable(msg) => write!(f, "capability unavailable: {msg}"),
            PlatformError::Refused(msg) => write!(f, "platform refused: {msg}"),
            PlatformError::Internal(msg) => write!(f, "platform error: {msg}"),
        }
    }
}

impl std::error::Error for PlatformError {}

// ---------------------------------------------------------------------------
// Step sensor
// ---------------------------------------------------------------------------

/// An open step subscription as handed out by [`StepSensor::watch`].
///
/// The receiver yields [`DeltaEvent`]s until the subscription is released,
/// at which point the sensor drops its sender and the stream ends.
#[derive(Debug)]
pub struct Watch {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<DeltaEvent>,
}

/// Motion sensor contract.
///
/// Implementations must be object-safe and `Send + Sync`; the engine holds an
/// `Arc<dyn StepSensor>` shared between the foreground and background flows.
#[async_trait]
pub trait StepSensor: Send + Sync {
    /// Whether step counting hardware is present at all.
    async fn is_available(&self) -> Result<bool, PlatformError>;

    async fn get_permissions(&self) -> Result<PermissionStatus, PlatformError>;

    /// Prompt the user. Returns the status after the prompt closes.
    async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError>;

    /// `true` when the platform keeps step history and can answer
    /// [`get_step_count`][StepSensor::get_step_count].
    fn supports_history(&self) -> bool;

    /// Steps counted inside `window`.
    ///
    /// Platforms without history return [`PlatformError::Unavailable`]; the
    /// default does exactly that.
    async fn get_step_count(&self, window: StepWindow) -> Result<u64, PlatformError> {
        let _ = window;
        Err(PlatformError::Unavailable(
            "historical step query not supported".to_string(),
        ))
    }

    /// Open a live subscription.
    fn watch(&self) -> Result<Watch, PlatformError>;

    /// Close a live subscription. Unknown ids are ignored.
    fn release(&self, id: SubscriptionId);
}

// ---------------------------------------------------------------------------
// Background scheduler
// ---------------------------------------------------------------------------

/// Callback invoked by the scheduler on each background wake.
#[async_trait]
pub trait WakeHandler: Send + Sync {
    async fn on_wake(&self) -> TaskResult;
}

/// Periodic background wake facility.
///
/// `define_task` binds a handler to a task id (process-wide, before any
/// registration); `register_task` asks the platform to start invoking it.
/// Invocations for a task never overlap.
#[async_trait]
pub trait BackgroundScheduler: Send + Sync {
    async fn status(&self) -> Result<SchedulerStatus, PlatformError>;

    fn define_task(&self, task_id: &str, handler: Arc<dyn WakeHandler>);

    async fn register_task(&self, task_id: &str, options: TaskOptions)
        -> Result<(), PlatformError>;

    async fn unregister_task(&self, task_id: &str) -> Result<(), PlatformError>;

    async fn is_task_registered(&self, task_id: &str) -> Result<bool, PlatformError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Sensor without history that never emits.
    struct DeadSensor;

    #[async_trait]
    impl StepSensor for DeadSensor {
        async fn is_available(&self) -> Result<bool, PlatformError> {
            Ok(false)
        }

        async fn get_permissions(&self) -> Result<PermissionStatus, PlatformError> {
            Ok(PermissionStatus::blocked())
        }

        async fn request_permissions(&self) -> Result<PermissionStatus, PlatformError> {
            Ok(PermissionStatus::blocked())
        }

        fn supports_history(&self) -> bool {
            false
        }

        fn watch(&self) -> Result<Watch, PlatformError> {
            let (_tx, events) = mpsc::unbounded_channel();
            Ok(Watch {
                id: SubscriptionId(1),
                events,
            })
        }

        fn release(&self, _id: SubscriptionId) {}
    }

    #[tokio::test]
    async fn history_query_defaults_to_unavailable() {
        let sensor: Arc<dyn StepSensor> = Arc::new(DeadSensor);
        let window = StepWindow::trailing(chrono_now(), chrono::Duration::hours(24));
        let err = sensor.get_step_count(window).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable(_)));
    }

    #[tokio::test]
    async fn watch_stream_ends_when_sender_dropped() {
        let sensor = DeadSensor;
        let mut w = sensor.watch().unwrap();
        assert_eq!(w.events.recv().await, None);
    }

    #[test]
    fn platform_error_display() {
        assert_eq!(
            PlatformError::Refused("quota".to_string()).to_string(),
            "platform refused: quota"
        );
        assert_eq!(
            PlatformError::Unavailable("no pedometer".to_string()).to_string(),
            "capability unavailable: no pedometer"
        );
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
