//! Persisted-total watermark.
//!
//! Two flows (foreground and background) write the same key, each computing
//! `baseline + steps` from the baseline it read when its subscription opened.
//! A flow holding an older baseline would otherwise overwrite a more recent
//! total with a smaller one. The watermark remembers the highest total known
//! to be in the store and rejects writes below it.
//!
//! # Invariants
//!
//! - **Non-decreasing**: a write is accepted only if it is ≥ the watermark.
//! - **Advances only on successful writes**: a rejected or failed write does
//!   not move it.
//! - **Reads re-anchor**: after a successful store read the watermark equals
//!   the stored value, since the store is authoritative once read.

use stride_schemas::StepCount;

/// Result of checking a candidate write against the watermark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteFreshness {
    Fresh,
    /// Candidate is strictly below the last known stored total.
    Stale { watermark: StepCount, got: StepCount },
}

impl WriteFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, WriteFreshness::Fresh)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CountWatermark {
    /// `None` until the first read or write.
    last: Option<StepCount>,
}

impl CountWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check without advancing.
    pub fn check(&self, count: StepCount) -> WriteFreshness {
        match self.last {
            Some(wm) if count < wm => WriteFreshness::Stale {
                watermark: wm,
                got: count,
            },
            _ => WriteFreshness::Fresh,
        }
    }

    /// Record a successful write of `count`.
    pub fn advance(&mut self, count: StepCount) {
        self.last = Some(self.last.map_or(count, |wm| wm.max(count)));
    }

    /// Re-anchor to a value just read from the store.
    pub fn observe(&mut self, stored: StepCount) {
        self.last = Some(stored);
    }

    pub fn last(&self) -> Option<StepCount> {
        self.last
    }
}
