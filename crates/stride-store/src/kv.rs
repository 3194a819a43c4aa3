use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Errors a [`KeyValueStore`] backend may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem or device failure.
    Io(String),
    /// Backing data exists but cannot be decoded.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "store io error: {msg}"),
            StoreError::Corrupt(msg) => write!(f, "store data corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable key → string storage.
///
/// A successful `set` must be visible to every later `get`, including after a
/// process restart for durable backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store. Not durable; used by tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert(key.into(), value.into());
        Self {
            map: Mutex::new(map),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let kv = MemoryStore::new();
        assert_eq!(kv.get("k").await.unwrap(), None);
        kv.set("k", "150").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("150"));
    }

    #[test]
    fn store_error_display() {
        assert_eq!(
            StoreError::Io("disk full".to_string()).to_string(),
            "store io error: disk full"
        );
    }
}
