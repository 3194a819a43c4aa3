use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stride_reconcile::{EngineConfig, PermissionPolicy};
use stride_schemas::{TaskOptions, BACKGROUND_TASK_ID, STEP_COUNT_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub path: String,
    pub key: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: "stride-store.json".to_string(),
            key: STEP_COUNT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub task_id: String,
    pub min_interval_secs: u64,
    pub start_on_boot: bool,
    pub stop_on_terminate: bool,
    pub tick_window_ms: u64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            task_id: BACKGROUND_TASK_ID.to_string(),
            min_interval_secs: 1,
            start_on_boot: true,
            stop_on_terminate: false,
            tick_window_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSettings {
    pub max_prompts: u32,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            max_prompts: PermissionPolicy::default().max_prompts,
        }
    }
}

/// One year of history.
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    pub lookback_hours: u32,
    pub live_updates: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            live_updates: false,
        }
    }
}

/// Typed configuration. Unknown keys are ignored here and surface in the
/// unused-key report instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrideConfig {
    pub storage: StorageSettings,
    pub background: BackgroundSettings,
    pub permissions: PermissionSettings,
    pub snapshot: SnapshotSettings,
}

impl StrideConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: StrideConfig =
            serde_json::from_value(v.clone()).context("config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.key.trim().is_empty() {
            bail!("CONFIG_INVALID /storage/key must not be empty");
        }
        if self.storage.path.trim().is_empty() {
            bail!("CONFIG_INVALID /storage/path must not be empty");
        }
        if self.background.task_id.trim().is_empty() {
            bail!("CONFIG_INVALID /background/task_id must not be empty");
        }
        if self.background.min_interval_secs == 0 {
            bail!("CONFIG_INVALID /background/min_interval_secs must be at least 1");
        }
        if self.background.tick_window_ms == 0 {
            bail!("CONFIG_INVALID /background/tick_window_ms must be positive");
        }
        if self.snapshot.lookback_hours == 0 {
            bail!("CONFIG_INVALID /snapshot/lookback_hours must be positive");
        }
        if self.snapshot.lookback_hours > MAX_LOOKBACK_HOURS {
            bail!("CONFIG_INVALID /snapshot/lookback_hours must be at most {MAX_LOOKBACK_HOURS}");
        }
        Ok(())
    }

    pub fn task_options(&self) -> TaskOptions {
        TaskOptions {
            min_interval: Duration::from_secs(self.background.min_interval_secs),
            start_on_boot: self.background.start_on_boot,
            stop_on_terminate: self.background.stop_on_terminate,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            task_id: self.background.task_id.clone(),
            task_options: self.task_options(),
            permission: PermissionPolicy {
                max_prompts: self.permissions.max_prompts,
            },
            snapshot_lookback: chrono::Duration::hours(i64::from(self.snapshot.lookback_hours)),
            snapshot_live_updates: self.snapshot.live_updates,
            background_tick_window: Duration::from_millis(self.background.tick_window_ms),
        }
    }
}
