use std::time::Duration;

use anyhow::{Context as _, Result};
use stride_schemas::{PermissionStatus, StepCount};
use stride_store::FileStore;
use stride_testkit::{wait_for_count, SimRig, SimScheduler, SimSensor};
use tracing::{info, warn};

use super::Context;

const EVENT_WAIT: Duration = Duration::from_secs(2);

pub struct SimulateArgs {
    pub walks: Vec<u64>,
    pub history: Option<u64>,
    pub blocked: bool,
}

#[derive(Debug)]
pub struct SimulateOutcome {
    pub mode: &'static str,
    pub total: StepCount,
}

/// One foreground session on a simulated pedometer over the real store:
/// activate, take each walk, deactivate and drain pending writes.
pub async fn simulate(ctx: &Context, args: SimulateArgs) -> Result<SimulateOutcome> {
    let mut sensor = SimSensor::new();
    if let Some(steps) = args.history {
        sensor = sensor.with_history(steps);
    }
    if args.blocked {
        sensor = sensor.with_permission(PermissionStatus::blocked());
    }

    let rig = SimRig::with(sensor, SimScheduler::default(), FileStore::new(&ctx.store_path))
        .with_key(&ctx.config.storage.key);
    let engine = rig.engine(ctx.config.engine_config());
    let mut display = engine.display();

    let activation = engine
        .activate()
        .await
        .context("step counting did not start")?;
    let Some(mode) = activation.mode() else {
        warn!("simulated sensor unavailable");
        return Ok(SimulateOutcome {
            mode: "idle",
            total: StepCount::ZERO,
        });
    };

    let mut expected = activation.baseline();
    for steps in args.walks {
        rig.sensor.walk(steps);
        if activation.subscription().is_none() {
            continue;
        }
        expected = expected.plus(steps);
        let seen = wait_for_count(&mut display, expected, EVENT_WAIT).await;
        info!(steps, total = seen.get(), "walked");
    }

    activation.deactivate().await;
    engine.queue().flush().await;

    let stats = engine.queue().stats();
    info!(
        written = stats.written,
        failed = stats.failed,
        skipped_stale = stats.skipped_stale,
        "session persisted"
    );

    Ok(SimulateOutcome {
        mode: mode.as_str(),
        total: engine.current(),
    })
}
