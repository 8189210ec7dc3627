//! Persistent key-value storage for wallet data.
//!
//! Only the last known balance is persisted, as a decimal string under
//! [`BALANCE_KEY`].

use crate::{WalletError, WalletResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Key of the persisted balance.
pub const BALANCE_KEY: &str = "balance";

/// String key-value store with explicit flush.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value (not durable until [`KeyValueStore::save`]).
    fn set(&self, key: &str, value: String);

    /// Persist pending writes.
    async fn save(&self) -> WalletResult<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one entry.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.values.write().insert(key.to_string(), value.to_string());
        store
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.write().insert(key.to_string(), value);
    }

    async fn save(&self) -> WalletResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store backed by a JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .map_err(|e| WalletError::Storage(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&data)
                .map_err(|e| WalletError::Storage(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = values.len(), "Opened wallet store");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.values.write().insert(key.to_string(), value);
    }

    async fn save(&self) -> WalletResult<()> {
        let data = serde_json::to_string_pretty(&*self.values.read())
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WalletError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| WalletError::Storage(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Saved wallet store");
        Ok(())
    }
}
