//! TTL cache for external geographic lookups.
//!
//! Keys combine a query-type tag with a point snapped to a configurable grid
//! cell, so nearby candidates share one external call. Lookups never fail: a
//! malformed or expired entry is treated as a miss and the caller refetches.
//! Concurrent miss-then-populate races are allowed to duplicate work; there
//! are no per-key locks.

mod store;

pub use store::{CacheStore, MemoryStore, SledStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

use crate::geometry::snap_to_cell;
use crate::models::GeoPoint;

/// Time source, injectable so TTL behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Composite cache key: query-type tag plus a geographic cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a point-based lookup, snapped to a grid cell of
    /// `resolution_deg` degrees. `params` disambiguates queries of the same
    /// type with different arguments (radius, keywords, ...).
    pub fn for_cell(service: &str, point: GeoPoint, resolution_deg: f64, params: &str) -> Self {
        let (row, col) = snap_to_cell(point, resolution_deg);
        let query = format!("{}:{}:{}", row, col, params);
        Self(format!("{}:{:016x}", service, xxh64(query.as_bytes(), 0)))
    }

    /// Key for a free-form query (e.g. a geocoded city name).
    pub fn for_query(service: &str, query: &str) -> Self {
        Self(format!("{}:{:016x}", service, xxh64(query.as_bytes(), 0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored envelope: payload plus creation and expiry timestamps.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    payload: serde_json::Value,
}

/// TTL cache over a pluggable backing store.
#[derive(Clone)]
pub struct GeoCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl GeoCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// In-memory cache with the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Fetch a cached value. Expired or malformed entries count as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = self.store.get(key.as_str()).await?;

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("evicting corrupt cache entry {}: {}", key.as_str(), e);
                self.store.invalidate(key.as_str()).await;
                return None;
            }
        };

        if self.clock.now() >= entry.expires_at {
            debug!("cache entry {} expired", key.as_str());
            self.store.invalidate(key.as_str()).await;
            return None;
        }

        match serde_json::from_value(entry.payload) {
            Ok(value) => {
                debug!("cache hit for {}", key.as_str());
                Some(value)
            }
            Err(e) => {
                warn!("evicting cache entry {} with bad payload: {}", key.as_str(), e);
                self.store.invalidate(key.as_str()).await;
                None
            }
        }
    }

    /// Store a value with a time-to-live. Serialization problems are logged
    /// and swallowed: the cache is an optimization, not a dependency.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize cache value for {}: {}", key.as_str(), e);
                return;
            }
        };

        let now = self.clock.now();
        let entry = CacheEntry {
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            payload,
        };

        match serde_json::to_string(&entry) {
            Ok(raw) => self.store.put(key.as_str(), raw).await,
            Err(e) => warn!("failed to serialize cache entry for {}: {}", key.as_str(), e),
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.store.invalidate(key.as_str()).await;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ManualClock;
    use super::*;

    fn cache_with_clock() -> (GeoCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = GeoCache::new(Arc::new(MemoryStore::new()), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_round_trip_before_ttl() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::for_query("population", "test");

        cache.put(&key, &4321.0_f64, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<f64>(&key).await, Some(4321.0));
    }

    #[tokio::test]
    async fn test_absent_after_ttl() {
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::for_query("population", "test");

        cache.put(&key, &4321.0_f64, Duration::from_secs(60)).await;
        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get::<f64>(&key).await, None);
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_absent() {
        // now == expires_at counts as expired
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::for_query("density", "boundary");

        cache.put(&key, &1.0_f64, Duration::from_secs(60)).await;
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get::<f64>(&key).await, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::for_query("places", "lyon");

        cache.put(&key, &vec![1, 2, 3], Duration::from_secs(60)).await;
        cache.invalidate(&key).await;
        assert_eq!(cache.get::<Vec<i32>>(&key).await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let cache = GeoCache::new(store.clone(), Arc::new(SystemClock));
        let key = CacheKey::for_query("places", "lyon");

        store.put(key.as_str(), "not json at all".to_string()).await;
        assert_eq!(cache.get::<Vec<i32>>(&key).await, None);
        // Evicted, so the raw entry is gone too
        assert_eq!(store.get(key.as_str()).await, None);
    }

    #[tokio::test]
    async fn test_nearby_points_share_a_key() {
        let a = GeoPoint::new(45.7601, 4.8302);
        let b = GeoPoint::new(45.7603, 4.8304);
        let key_a = CacheKey::for_cell("density", a, 0.005, "");
        let key_b = CacheKey::for_cell("density", b, 0.005, "");
        assert_eq!(key_a, key_b);
    }

    #[tokio::test]
    async fn test_params_separate_keys() {
        let p = GeoPoint::new(45.76, 4.83);
        let key_a = CacheKey::for_cell("places", p, 0.005, "radius=800");
        let key_b = CacheKey::for_cell("places", p, 0.005, "radius=1200");
        assert_ne!(key_a, key_b);
    }
}
