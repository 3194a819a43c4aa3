use stride_schemas::{DeltaEvent, StepCount};

/// How the step count is obtained for one activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Platform answers "steps in the last N hours" directly.
    Snapshot,
    /// Baseline from the store plus a live subscription.
    Accumulation,
}

impl AcquisitionMode {
    pub fn select(supports_history: bool) -> Self {
        if supports_history {
            AcquisitionMode::Snapshot
        } else {
            AcquisitionMode::Accumulation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Snapshot => "snapshot",
            AcquisitionMode::Accumulation => "accumulation",
        }
    }
}

/// Running total for an event of the subscription opened at `baseline`.
///
/// `event.steps` is already cumulative within the subscription, so the total
/// depends only on the baseline and the latest event.
pub fn reconcile_total(baseline: StepCount, event: DeltaEvent) -> StepCount {
    baseline.plus(event.steps)
}
