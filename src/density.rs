//! Residential density evaluation.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::{CacheKey, GeoCache};
use crate::models::{DensityScore, GeoPoint};
use crate::sources::{with_timeout, DensitySource};

/// Normalizes raw residential density into a [0, 1] score.
pub struct DensityEvaluator {
    source: Arc<dyn DensitySource>,
    cache: GeoCache,
    cache_ttl: Duration,
    cell_resolution_deg: f64,
    /// Raw density (units/km²) at which the score saturates at 1.0.
    threshold: f64,
    timeout: Duration,
}

impl DensityEvaluator {
    pub fn new(
        source: Arc<dyn DensitySource>,
        cache: GeoCache,
        cache_ttl: Duration,
        cell_resolution_deg: f64,
        threshold: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            cache_ttl,
            cell_resolution_deg,
            threshold,
            timeout,
        }
    }

    /// Density score at `point`. Source failures degrade to an
    /// `unavailable` zero score.
    pub async fn evaluate(&self, point: GeoPoint) -> DensityScore {
        let key = CacheKey::for_cell("density", point, self.cell_resolution_deg, "");

        // Raw density is cached, not the score, so threshold changes take
        // effect without invalidating entries
        let raw = match self.cache.get::<f64>(&key).await {
            Some(raw) => raw,
            None => match with_timeout(self.timeout, self.source.density_at(point)).await {
                Ok(raw) => {
                    self.cache.put(&key, &raw, self.cache_ttl).await;
                    raw
                }
                Err(e) => {
                    warn!("density source failed at {}: {}", point, e);
                    return DensityScore::unavailable();
                }
            },
        };

        DensityScore::new(raw, self.threshold)
    }
}
