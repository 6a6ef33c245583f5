//! Competitor detection within a reachability area.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheKey, GeoCache};
use crate::error::SourceError;
use crate::models::{CompetitorRecord, ReachabilityArea};
use crate::sources::{with_timeout, PlaceHit, PlacesSource, RateLimiter};

/// Finds competing establishments inside a reachability area.
///
/// Providers take center+radius, so the query is bounded by the area's
/// bounding circle and hits are post-filtered by point-in-polygon: an
/// isochrone-derived area accepts fewer hits than its bounding circle.
/// Cache misses are paced by a per-second call budget; cache hits cost
/// nothing against it.
pub struct CompetitorDetector {
    source: Arc<dyn PlacesSource>,
    cache: GeoCache,
    cache_ttl: Duration,
    cell_resolution_deg: f64,
    keywords: Vec<String>,
    limiter: RateLimiter,
    timeout: Duration,
}

impl CompetitorDetector {
    pub fn new(
        source: Arc<dyn PlacesSource>,
        cache: GeoCache,
        cache_ttl: Duration,
        cell_resolution_deg: f64,
        keywords: Vec<String>,
        calls_per_second: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            cache_ttl,
            cell_resolution_deg,
            keywords,
            limiter: RateLimiter::new(calls_per_second),
            timeout,
        }
    }

    fn cache_key(&self, area: &ReachabilityArea) -> CacheKey {
        let (center, radius) = area.bounding_circle();
        CacheKey::for_cell(
            "places",
            center,
            self.cell_resolution_deg,
            &format!("r{:.0}:{}", radius / 10.0, self.keywords.join(",")),
        )
    }

    /// Competitors inside `area`, nearest first.
    ///
    /// Zero hits is a valid (and for the caller, high-value) answer. An `Err`
    /// means the source failed; the caller annotates the candidate as
    /// degraded instead of aborting.
    pub async fn competitors_within(
        &self,
        area: &ReachabilityArea,
    ) -> Result<Vec<CompetitorRecord>, SourceError> {
        let key = self.cache_key(area);
        let (center, radius_m) = area.bounding_circle();

        let hits = match self.cache.get::<Vec<PlaceHit>>(&key).await {
            Some(hits) => hits,
            None => {
                self.limiter.acquire().await;
                let hits = with_timeout(
                    self.timeout,
                    self.source.search(center, radius_m, &self.keywords),
                )
                .await?;
                // Cache the raw radius query; the polygon filter below stays
                // per-area so isochrones and circles can share entries
                self.cache.put(&key, &hits, self.cache_ttl).await;
                hits
            }
        };

        let mut records: Vec<CompetitorRecord> = hits
            .into_iter()
            .filter(|hit| area.contains(hit.location))
            .map(|hit| CompetitorRecord {
                distance_m: hit.location.distance_m(center),
                name: hit.name,
                location: hit.location,
                category: hit.category,
            })
            .collect();

        records.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        debug!(
            "{} competitors within area around {}",
            records.len(),
            center
        );
        Ok(records)
    }
}
