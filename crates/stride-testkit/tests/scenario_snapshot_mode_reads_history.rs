//! Scenario: Snapshot Mode Reads History
//!
//! # Invariants under test
//!
//! 1. A sensor with history displays the trailing-window count and persists
//!    nothing.
//! 2. Snapshot mode neither subscribes nor touches the background task.
//! 3. With live updates on, events add to the snapshot and still persist
//!    nothing; teardown releases the subscription.
//! 4. A lookback reaching past the earliest representable time still
//!    produces a snapshot.

use std::time::Duration;

use stride_reconcile::{AcquisitionMode, EngineConfig};
use stride_schemas::{StepCount, STEP_COUNT_KEY};
use stride_testkit::{wait_for_count, FlakyStore, SimRig, SimScheduler, SimSensor};

const WITHIN: Duration = Duration::from_secs(2);

fn history_rig(steps: u64) -> SimRig {
    SimRig::with(
        SimSensor::new().with_history(steps),
        SimScheduler::default(),
        FlakyStore::with_value(STEP_COUNT_KEY, "7"),
    )
}

#[tokio::test]
async fn snapshot_displays_history_and_persists_nothing() {
    let rig = history_rig(4200);
    let engine = rig.engine(EngineConfig::default());

    let activation = engine.activate().await.unwrap();
    assert_eq!(activation.mode(), Some(AcquisitionMode::Snapshot));
    assert_eq!(activation.baseline(), StepCount::new(4200));
    assert_eq!(engine.current(), StepCount::new(4200));
    assert_eq!(activation.subscription(), None);

    assert_eq!(rig.sensor.watch_calls(), 0);
    assert_eq!(rig.scheduler.register_calls(), 0);
    activation.deactivate().await;

    engine.queue().flush().await;
    assert!(rig.store.writes().is_empty());
    assert_eq!(rig.store.peek(STEP_COUNT_KEY).await.as_deref(), Some("7"));
}

#[tokio::test]
async fn live_snapshot_adds_events_without_persisting() {
    let rig = history_rig(4200);
    let engine = rig.engine(EngineConfig {
        snapshot_live_updates: true,
        ..EngineConfig::default()
    });
    let mut display = engine.display();

    let activation = engine.activate().await.unwrap();
    let id = activation.subscription().unwrap();

    rig.sensor.walk(10);
    assert_eq!(
        wait_for_count(&mut display, StepCount::new(4210), WITHIN).await,
        StepCount::new(4210)
    );

    activation.deactivate().await;
    engine.queue().flush().await;
    assert!(rig.store.writes().is_empty());
    assert_eq!(rig.sensor.releases(), vec![id]);
}

#[tokio::test]
async fn oversized_lookback_still_snapshots() {
    let rig = history_rig(4200);
    let engine = rig.engine(EngineConfig {
        snapshot_lookback: chrono::Duration::hours(i64::from(u32::MAX)),
        ..EngineConfig::default()
    });

    let activation = engine.activate().await.unwrap();
    assert_eq!(activation.mode(), Some(AcquisitionMode::Snapshot));
    assert_eq!(engine.current(), StepCount::new(4200));
    activation.deactivate().await;
}
