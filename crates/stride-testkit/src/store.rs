use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stride_store::{KeyValueStore, MemoryStore, StoreError};

/// In-memory store with switchable read/write failures and a write log.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        Self {
            inner: MemoryStore::with_value(key, value),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Values of every successful write, in order.
    pub fn writes(&self) -> Vec<String> {
        self.log().clone()
    }

    /// Current stored value, bypassing failure injection.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.ok().flatten()
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io("simulated read failure".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("simulated write failure".to_string()));
        }
        self.inner.set(key, value).await?;
        self.log().push(value.to_string());
        Ok(())
    }
}
