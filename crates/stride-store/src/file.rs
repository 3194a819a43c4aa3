//! File-backed durable store.
//!
//! The whole map is kept as one JSON object (`{"key": "value", ...}`).
//! Every `set` rewrites the file through a temp file in the same directory
//! followed by a rename, so a crash mid-write leaves either the old or the
//! new document on disk, never a torn one.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::kv::{KeyValueStore, StoreError};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                StoreError::Corrupt(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io(format!("read {}: {e}", self.path.display()))),
        }
    }

    async fn persist_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| StoreError::Io(format!("encode store: {e}")))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Io(format!("store writer task failed: {e}")))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io = |what: &str, e: std::io::Error| StoreError::Io(format!("{what} {}: {e}", path.display()));

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io("create temp for", e))?;
    tmp.write_all(bytes).map_err(|e| io("write temp for", e))?;
    tmp.as_file().sync_all().map_err(|e| io("sync temp for", e))?;
    tmp.persist(path).map_err(|e| io("rename temp onto", e.error))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let map = self.load_map().await?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = match self.load_map().await {
            Ok(m) => m,
            Err(StoreError::Corrupt(msg)) => {
                warn!(path = %self.path.display(), error = %msg, "replacing corrupt store file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        map.insert(key.to_string(), value.to_string());
        self.persist_map(&map).await
    }
}
