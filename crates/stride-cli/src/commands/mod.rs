//! Command handlers for `stride`.
//!
//! Shared config/store wiring lives here; the simulator lives in its own
//! module.

mod simulate;

pub use simulate::{simulate, SimulateArgs};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use stride_config::{report_unused_keys, StrideConfig, UnusedKeyPolicy};
use stride_schemas::StepCount;
use stride_store::{CounterStore, FileStore};
use tracing::{info, warn};

/// Overrides `/storage/path` when set.
pub const ENV_STORE_PATH: &str = "STRIDE_STORE_PATH";

pub struct Context {
    pub config: StrideConfig,
    pub store_path: PathBuf,
}

impl Context {
    pub fn counter_store(&self) -> CounterStore {
        CounterStore::new(
            Arc::new(FileStore::new(&self.store_path)),
            self.config.storage.key.clone(),
        )
    }
}

/// Load layered config (built-in defaults when `paths` is empty) and
/// resolve the store location.
pub fn load_context(paths: &[String], strict: bool) -> Result<Context> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = stride_config::load_layered_yaml(&path_refs)?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for leaf in &report.unused_leaf_pointers {
        warn!(pointer = %leaf, "config key is not read by anything");
    }

    let config = loaded.settings()?;
    let store_path = store_path_from_env().unwrap_or_else(|| PathBuf::from(&config.storage.path));
    info!(
        config_hash = %loaded.config_hash,
        store = %store_path.display(),
        key = %config.storage.key,
        "config loaded"
    );

    Ok(Context {
        config,
        store_path,
    })
}

fn store_path_from_env() -> Option<PathBuf> {
    let raw = std::env::var(ENV_STORE_PATH).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

pub async fn show(ctx: &Context) -> Result<StepCount> {
    Ok(ctx.counter_store().try_read().await?)
}

pub async fn reset(ctx: &Context) -> Result<()> {
    if !ctx.counter_store().write(StepCount::ZERO).await {
        bail!("could not reset step count at {}", ctx.store_path.display());
    }
    Ok(())
}

pub fn readout(count: StepCount) -> String {
    format!("You have taken {count} steps")
}
