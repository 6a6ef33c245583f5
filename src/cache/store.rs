//! Backing stores for the geographic cache.
//!
//! The engine only needs get/put/invalidate over strings; expiry is handled a
//! level up. Two adapters: an in-memory map and a sled tree for runs that
//! should survive a restart.

use async_trait::async_trait;
use hashbrown::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::warn;

/// Key-value storage contract consumed by [`GeoCache`](super::GeoCache).
///
/// Implementations must be safe under concurrent access from multiple
/// in-flight evaluations. Callers get no exclusivity guarantees: two tasks
/// missing on the same key may both fetch and both write.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: String);
    async fn invalidate(&self, key: &str);
}

/// Process-local store backed by a hash map.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    async fn put(&self, key: &str, value: String) {
        self.entries.write().unwrap().insert(key.to_string(), value);
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }
}

/// Persistent store backed by a sled tree.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl CacheStore for SledStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("sled read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: String) {
        if let Err(e) = self.db.insert(key.as_bytes(), value.into_bytes()) {
            warn!("sled write failed for {}: {}", key, e);
        }
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.db.remove(key.as_bytes()) {
            warn!("sled remove failed for {}: {}", key, e);
        }
    }
}
