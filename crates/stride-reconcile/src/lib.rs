//! stride-reconcile
//!
//! Reconciliation Engine: merges the persisted baseline, live step
//! subscriptions and background wake ticks into one running total.
//!
//! Architectural decisions:
//! - Acquisition mode is chosen per activation from sensor capability:
//!   snapshot (platform keeps history) or accumulation (baseline + stream)
//! - `total = baseline + latest event steps`; events are never summed
//! - Each context (foreground, background) owns its subscription through a
//!   lease; leases release on every exit path
//! - Permission prompting is a bounded loop
//! - Every write goes through the store's single-writer queue
//! - A background tick releases its subscription before returning

mod background;
mod engine;
mod error;
mod permission;
mod registry;
mod total;

pub use background::BackgroundCounter;
pub use engine::{Activation, EngineConfig, StepEngine};
pub use error::EngineError;
pub use permission::{negotiate_permission, PermissionPolicy};
pub use registry::{Lease, SubscriptionRegistry};
pub use total::{reconcile_total, AcquisitionMode};
