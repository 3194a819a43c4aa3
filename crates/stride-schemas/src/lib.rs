//! stride-schemas
//!
//! Value types shared by the platform boundary, the counter store and the
//! reconciliation engine. No IO, no async.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage key holding the cumulative step count.
pub const STEP_COUNT_KEY: &str = "@count-steps_steps";

/// Identifier of the periodic background task.
pub const BACKGROUND_TASK_ID: &str = "background-step-count";

// ---------------------------------------------------------------------------
// StepCount
// ---------------------------------------------------------------------------

/// Cumulative step total. Never negative.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StepCount(u64);

impl StepCount {
    pub const ZERO: StepCount = StepCount(0);

    pub const fn new(steps: u64) -> Self {
        Self(steps)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Add a within-subscription step count to this baseline.
    ///
    /// Saturates at `u64::MAX` instead of wrapping.
    pub fn plus(self, steps: u64) -> Self {
        Self(self.0.saturating_add(steps))
    }

    /// Decode a stored value.
    ///
    /// | stored text                   | result              |
    /// |-------------------------------|---------------------|
    /// | absent                        | `0`                 |
    /// | `"157"`, `" 157 "`            | `157`               |
    /// | `"157.9"`, `"1e3"`            | truncated (`157`, `1000`) |
    /// | `""`, `"abc"`, `"NaN"`, `"-4"`| `0`                 |
    ///
    /// Never fails: an unreadable value is a zero baseline, not an error.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::ZERO;
        };
        let t = raw.trim();
        if let Ok(n) = t.parse::<u64>() {
            return Self(n);
        }
        match t.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 => Self(f.trunc() as u64),
            _ => Self::ZERO,
        }
    }

    /// Encode for storage (plain decimal).
    pub fn to_stored(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for StepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepCount {
    fn from(steps: u64) -> Self {
        Self(steps)
    }
}

// ---------------------------------------------------------------------------
// Sensor types
// ---------------------------------------------------------------------------

/// One update from a live step subscription.
///
/// `steps` is cumulative since the subscription was opened. It is NOT an
/// increment over the previous event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub steps: u64,
}

impl DeltaEvent {
    pub fn new(steps: u64) -> Self {
        Self { steps }
    }
}

/// Opaque token for an open step subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Motion permission as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub granted: bool,
    pub can_ask_again: bool,
}

impl PermissionStatus {
    pub fn granted() -> Self {
        Self {
            granted: true,
            can_ask_again: true,
        }
    }

    pub fn askable() -> Self {
        Self {
            granted: false,
            can_ask_again: true,
        }
    }

    pub fn blocked() -> Self {
        Self {
            granted: false,
            can_ask_again: false,
        }
    }
}

/// Half-open time range for a historical step query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StepWindow {
    /// Window of `lookback` ending at `end`.
    ///
    /// A lookback reaching past the earliest representable time starts there.
    pub fn trailing(end: DateTime<Utc>, lookback: chrono::Duration) -> Self {
        Self {
            start: end
                .checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler types
// ---------------------------------------------------------------------------

/// Availability of the background wake facility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    Available,
    Unavailable,
    Restricted,
}

impl SchedulerStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, SchedulerStatus::Available)
    }
}

/// Registration options for a periodic task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    pub min_interval: Duration,
    pub start_on_boot: bool,
    pub stop_on_terminate: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            start_on_boot: true,
            stop_on_terminate: false,
        }
    }
}

/// Value a background task hands back to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    NewData,
    NoData,
    Failed,
}

/// Who owns a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextId {
    Foreground,
    Background,
}

impl ContextId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextId::Foreground => "foreground",
            ContextId::Background => "background",
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_is_zero() {
        assert_eq!(StepCount::from_stored(None), StepCount::ZERO);
    }

    #[test]
    fn integer_text_parses() {
        assert_eq!(StepCount::from_stored(Some("150")), StepCount::new(150));
        assert_eq!(StepCount::from_stored(Some("  42\n")), StepCount::new(42));
    }

    #[test]
    fn garbage_resolves_to_zero() {
        for raw in ["", "abc", "NaN", "-4", "inf", "12steps"] {
            assert_eq!(
                StepCount::from_stored(Some(raw)),
                StepCount::ZERO,
                "stored {raw:?} must resolve to zero"
            );
        }
    }

    #[test]
    fn fractional_text_truncates() {
        assert_eq!(StepCount::from_stored(Some("157.9")), StepCount::new(157));
        assert_eq!(StepCount::from_stored(Some("1e3")), StepCount::new(1000));
    }

    #[test]
    fn stored_form_is_plain_decimal() {
        assert_eq!(StepCount::new(157).to_stored(), "157");
        assert_eq!(
            StepCount::from_stored(Some(&StepCount::new(9_001).to_stored())),
            StepCount::new(9_001)
        );
    }

    #[test]
    fn plus_saturates() {
        assert_eq!(StepCount::new(u64::MAX - 1).plus(5).get(), u64::MAX);
        assert_eq!(StepCount::new(150).plus(7), StepCount::new(157));
    }

    #[test]
    fn trailing_window_spans_lookback() {
        let end = Utc::now();
        let w = StepWindow::trailing(end, chrono::Duration::hours(24));
        assert_eq!(w.end - w.start, chrono::Duration::hours(24));
    }

    #[test]
    fn oversized_lookback_starts_at_earliest_time() {
        let end = Utc::now();
        let w = StepWindow::trailing(end, chrono::Duration::hours(i64::from(u32::MAX)));
        assert_eq!(w.start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(w.end, end);
    }

    #[test]
    fn step_count_serializes_transparently() {
        let s = serde_json::to_string(&StepCount::new(7)).unwrap();
        assert_eq!(s, "7");
    }

    #[test]
    fn only_available_scheduler_is_available() {
        assert!(SchedulerStatus::Available.is_available());
        assert!(!SchedulerStatus::Unavailable.is_available());
        assert!(!SchedulerStatus::Restricted.is_available());
    }
}
