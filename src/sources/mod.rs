//! Contracts for external data sources.
//!
//! Each source is a capability trait with two adapters: a network-backed one
//! under [`http`] and a deterministic fixture under [`fixtures`] for tests and
//! offline runs. The engine only ever talks to the traits.

pub mod fixtures;
pub mod http;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use geo::{Polygon, Rect};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::SourceError;
use crate::models::GeoPoint;

/// One population-grid cell: geometry plus total headcount.
///
/// Population is assumed uniformly distributed within the cell; apportionment
/// splits it by overlap area.
#[derive(Debug, Clone)]
pub struct PopulationCell {
    pub geometry: Polygon<f64>,
    pub population: f64,
}

/// Census/statistical population grid, queried by bounding geometry.
#[async_trait]
pub trait PopulationSource: Send + Sync {
    async fn fetch_cells(&self, bbox: Rect<f64>) -> Result<Vec<PopulationCell>, SourceError>;

    /// Tag recorded in [`PopulationFigure`](crate::models::PopulationFigure) provenance.
    fn name(&self) -> &str;
}

/// Raw hit from a places provider, before point-in-polygon filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceHit {
    pub name: String,
    pub location: GeoPoint,
    pub category: String,
}

/// Places provider for competing establishments. Takes center+radius; callers
/// post-filter against the actual reachability polygon.
#[async_trait]
pub trait PlacesSource: Send + Sync {
    async fn search(
        &self,
        center: GeoPoint,
        radius_m: f64,
        keywords: &[String],
    ) -> Result<Vec<PlaceHit>, SourceError>;
}

/// Residential density source (cadastral/statistical), in units or
/// inhabitants per km².
#[async_trait]
pub trait DensitySource: Send + Sync {
    async fn density_at(&self, point: GeoPoint) -> Result<f64, SourceError>;
}

/// A city or postal code resolved to a searchable disc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedArea {
    pub center: GeoPoint,
    pub radius_m: f64,
    pub label: String,
}

/// Forward and reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a city name or postal code into a search disc.
    async fn resolve_area(&self, query: &str) -> Result<ResolvedArea, SourceError>;

    /// Best-effort address for a point. `Ok(None)` means the provider had no
    /// answer, which is not an error.
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, SourceError>;
}

/// Pedestrian-network isochrone provider.
#[async_trait]
pub trait IsochroneProvider: Send + Sync {
    async fn isochrone(
        &self,
        origin: GeoPoint,
        minutes: f64,
        speed_kmh: f64,
    ) -> Result<Polygon<f64>, SourceError>;
}

/// Spaces calls out by a minimum interval to respect a per-second budget.
///
/// Contending tasks queue on the mutex, so bursts from concurrent candidate
/// evaluations are flattened into an even call stream.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(calls_per_second: f64) -> Self {
        let calls_per_second = calls_per_second.max(0.1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / calls_per_second),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub async fn acquire(&self) {
        let mut slot = self.next_slot.lock().await;
        let now = Instant::now();
        if *slot > now {
            tokio::time::sleep_until(*slot).await;
        }
        *slot = (*slot).max(now) + self.min_interval;
    }
}

/// Bound an external call by the configured per-call timeout.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(SourceError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let res = with_timeout(Duration::from_secs(1), async { Ok::<_, SourceError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_times_out() {
        let res = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, SourceError>(7)
        })
        .await;
        assert!(matches!(res, Err(SourceError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(10.0); // 100ms apart
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Third call cannot land before 2 intervals have passed
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
