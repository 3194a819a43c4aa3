//! stride-store
//!
//! Persisted Counter Store.
//!
//! Architectural decisions:
//! - Storage is a plain key → string map behind [`KeyValueStore`]
//! - The cumulative count lives under one fixed key
//! - Reads never fail: absent or malformed values are a zero baseline
//! - Write failures are logged and swallowed; the counting path never stops
//! - All engine writes go through one ordered single-writer [`PersistQueue`]
//!   that refuses to lower the last observed total

mod counter;
mod file;
mod kv;
mod queue;
pub mod watermark;

pub use counter::CounterStore;
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore, StoreError};
pub use queue::{PersistQueue, QueueStats};
pub use watermark::{CountWatermark, WriteFreshness};
