//! Scenario: Background Tick Persists And Releases
//!
//! # Invariants under test
//!
//! 1. A wake reads the baseline fresh, persists baseline + steps and
//!    releases its subscription before returning.
//! 2. A wake whose subscription cannot be opened reports `Failed`.
//! 3. A stale foreground total can never lower what a wake persisted.
//! 4. A periodic ticker never stacks background subscriptions, and
//!    cancelling it mid-tick still releases.

use std::time::Duration;

use stride_reconcile::{EngineConfig, StepEngine};
use stride_schemas::{
    ContextId, StepCount, SubscriptionId, TaskResult, BACKGROUND_TASK_ID, STEP_COUNT_KEY,
};
use stride_testkit::{wait_for_count, FlakyStore, SimRig, SimScheduler, SimSensor};

const WITHIN: Duration = Duration::from_secs(2);

fn short_ticks() -> EngineConfig {
    EngineConfig {
        background_tick_window: Duration::from_millis(100),
        ..EngineConfig::default()
    }
}

async fn wait_for_background(engine: &StepEngine) -> SubscriptionId {
    for _ in 0..200 {
        if let Some(id) = engine.registry().active(ContextId::Background) {
            return id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background tick never subscribed");
}

/// Activate once so the task is registered, then leave the foreground.
async fn registered_in_background(rig: &SimRig, config: EngineConfig) -> StepEngine {
    let engine = rig.engine(config);
    engine.activate().await.unwrap().deactivate().await;
    assert!(rig.scheduler.is_registered(BACKGROUND_TASK_ID));
    engine
}

// ---------------------------------------------------------------------------
// 1. Persist and release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wake_persists_total_and_releases_subscription() {
    let rig = SimRig::with(
        SimSensor::new(),
        SimScheduler::default(),
        FlakyStore::with_value(STEP_COUNT_KEY, "500"),
    );
    let engine = registered_in_background(&rig, short_ticks()).await;

    let sched = rig.scheduler.clone();
    let tick = tokio::spawn(async move { sched.fire(BACKGROUND_TASK_ID).await });
    let bg_id = wait_for_background(&engine).await;

    rig.sensor.walk(4);
    rig.sensor.walk(6);

    let result = tokio::time::timeout(WITHIN, tick).await.unwrap().unwrap();
    assert_eq!(result, Some(TaskResult::NewData));

    assert_eq!(rig.store.peek(STEP_COUNT_KEY).await.as_deref(), Some("510"));
    assert_eq!(rig.store.writes(), vec!["504", "510"]);
    assert!(rig.sensor.releases().contains(&bg_id));
    assert!(rig.sensor.active_subscriptions().is_empty());
    assert_eq!(engine.registry().active_count(), 0);
}

#[tokio::test]
async fn consecutive_wakes_resume_from_the_previous_tick() {
    let rig = SimRig::new();
    let engine = registered_in_background(&rig, short_ticks()).await;

    for expected in ["3", "6"] {
        let sched = rig.scheduler.clone();
        let tick = tokio::spawn(async move { sched.fire(BACKGROUND_TASK_ID).await });
        wait_for_background(&engine).await;
        rig.sensor.walk(3);
        tokio::time::timeout(WITHIN, tick).await.unwrap().unwrap();
        assert_eq!(rig.store.peek(STEP_COUNT_KEY).await.as_deref(), Some(expected));
    }

    // Foreground picks up where the background left off.
    let activation = engine.activate().await.unwrap();
    assert_eq!(activation.baseline(), StepCount::new(6));
    activation.deactivate().await;
}

// ---------------------------------------------------------------------------
// 2. Failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wake_fails_when_sensor_refuses_to_subscribe() {
    let rig = SimRig::new();
    let engine = registered_in_background(&rig, short_ticks()).await;

    rig.sensor.set_fail_watch(true);
    assert_eq!(
        rig.scheduler.fire(BACKGROUND_TASK_ID).await,
        Some(TaskResult::Failed)
    );
    assert_eq!(engine.registry().active_count(), 0);
    assert!(rig.store.writes().is_empty());
}

// ---------------------------------------------------------------------------
// 3. Stale foreground
// ---------------------------------------------------------------------------

#[tokio::test]
async fn suspended_foreground_cannot_lower_persisted_total() {
    let rig = SimRig::new();
    let engine = rig.engine(short_ticks());
    let mut display = engine.display();
    let foreground = engine.activate().await.unwrap();
    let fg_id = foreground.subscription().unwrap();

    // OS suspends the foreground listener; only the wake sees steps.
    let sched = rig.scheduler.clone();
    let tick = tokio::spawn(async move { sched.fire(BACKGROUND_TASK_ID).await });
    let bg_id = wait_for_background(&engine).await;
    rig.sensor.walk_for(bg_id, 100);
    tokio::time::timeout(WITHIN, tick).await.unwrap().unwrap();
    assert_eq!(rig.store.peek(STEP_COUNT_KEY).await.as_deref(), Some("100"));

    // Foreground resumes with its old baseline of zero.
    rig.sensor.walk_for(fg_id, 3);
    wait_for_count(&mut display, StepCount::new(3), WITHIN).await;
    engine.queue().flush().await;

    assert_eq!(rig.store.peek(STEP_COUNT_KEY).await.as_deref(), Some("100"));
    assert_eq!(engine.queue().stats().skipped_stale, 1);

    foreground.deactivate().await;
    let next = engine.activate().await.unwrap();
    assert_eq!(next.baseline(), StepCount::new(100));
    next.deactivate().await;
}

// ---------------------------------------------------------------------------
// 4. Periodic ticker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ticker_never_stacks_background_subscriptions() {
    let rig = SimRig::new();
    let engine = registered_in_background(
        &rig,
        EngineConfig {
            background_tick_window: Duration::from_millis(15),
            ..EngineConfig::default()
        },
    )
    .await;

    let ticker = rig
        .scheduler
        .spawn_ticker(BACKGROUND_TASK_ID, Duration::from_millis(25));

    for _ in 0..10 {
        rig.sensor.walk(1);
        assert!(rig.sensor.active_subscriptions().len() <= 1);
        assert!(engine.registry().active_count() <= 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    ticker.abort();
    let _ = ticker.await;

    // One foreground watch plus at least two wakes.
    assert!(rig.sensor.watch_calls() >= 3);
    assert!(rig.sensor.active_subscriptions().is_empty());
    assert_eq!(rig.sensor.releases().len() as u64, rig.sensor.watch_calls());
}
