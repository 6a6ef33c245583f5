//! Walking-time reachability estimation.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{GeoPoint, Provenance, ReachabilityArea};
use crate::sources::{with_timeout, IsochroneProvider};

/// How reachability areas are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReachabilityPolicy {
    /// Circle of radius walking-speed x time. Fast, no routing data needed.
    Radius,
    /// Pedestrian-network isochrone, falling back to the circle when the
    /// provider is unavailable.
    Isochrone,
}

/// Converts a walking-time budget into a reachable area around a point.
pub struct ReachabilityEstimator {
    policy: ReachabilityPolicy,
    walking_speed_kmh: f64,
    provider: Option<Arc<dyn IsochroneProvider>>,
    timeout: Duration,
}

impl ReachabilityEstimator {
    pub fn new(
        policy: ReachabilityPolicy,
        walking_speed_kmh: f64,
        provider: Option<Arc<dyn IsochroneProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            policy,
            walking_speed_kmh,
            provider,
            timeout,
        }
    }

    /// Distance covered on foot in `minutes`, in meters.
    pub fn walking_radius_m(&self, minutes: f64) -> f64 {
        self.walking_speed_kmh * 1000.0 / 60.0 * minutes
    }

    /// Compute the area reachable from `origin` within `minutes`.
    ///
    /// Never fails: when the isochrone provider is missing, errors out, or
    /// times out, the radius approximation is returned with provenance
    /// `approximate` so one routing outage does not sink the candidate.
    pub async fn estimate(&self, origin: GeoPoint, minutes: f64) -> ReachabilityArea {
        let radius_m = self.walking_radius_m(minutes);

        if self.policy == ReachabilityPolicy::Isochrone {
            if let Some(provider) = &self.provider {
                match with_timeout(
                    self.timeout,
                    provider.isochrone(origin, minutes, self.walking_speed_kmh),
                )
                .await
                {
                    Ok(polygon) => {
                        if let Some(area) = ReachabilityArea::from_isochrone(origin, polygon) {
                            debug!("isochrone computed for {}", origin);
                            return area;
                        }
                        warn!("isochrone at {} was degenerate, using radius", origin);
                    }
                    Err(e) => {
                        warn!("isochrone at {} failed ({}), using radius", origin, e);
                    }
                }
                return ReachabilityArea::from_circle(origin, radius_m, Provenance::Approximate);
            }
            warn!("isochrone policy configured without a provider, using radius");
            return ReachabilityArea::from_circle(origin, radius_m, Provenance::Approximate);
        }

        ReachabilityArea::from_circle(origin, radius_m, Provenance::Measured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AreaShape;
    use crate::sources::fixtures::{FixtureIsochroneProvider, UnavailableIsochroneProvider};
    use geo::{Coord, LineString, Polygon};

    fn origin() -> GeoPoint {
        GeoPoint::new(45.76, 4.83)
    }

    #[test]
    fn test_walking_radius() {
        let estimator =
            ReachabilityEstimator::new(ReachabilityPolicy::Radius, 5.0, None, Duration::from_secs(5));
        // 5 km/h for 10 minutes is 833.33m
        assert!((estimator.walking_radius_m(10.0) - 833.333).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_radius_policy_is_measured() {
        let estimator =
            ReachabilityEstimator::new(ReachabilityPolicy::Radius, 5.0, None, Duration::from_secs(5));
        let area = estimator.estimate(origin(), 10.0).await;
        assert_eq!(area.shape(), AreaShape::Circle);
        assert_eq!(area.provenance(), Provenance::Measured);
        assert!(area.contains(origin()));
    }

    #[tokio::test]
    async fn test_isochrone_fallback_marks_approximate() {
        let estimator = ReachabilityEstimator::new(
            ReachabilityPolicy::Isochrone,
            5.0,
            Some(Arc::new(UnavailableIsochroneProvider)),
            Duration::from_secs(5),
        );
        let area = estimator.estimate(origin(), 10.0).await;
        assert_eq!(area.shape(), AreaShape::Circle);
        assert_eq!(area.provenance(), Provenance::Approximate);
    }

    #[tokio::test]
    async fn test_isochrone_policy_uses_provider_polygon() {
        let o = origin();
        let ring = vec![
            Coord { x: o.lon - 0.01, y: o.lat - 0.008 },
            Coord { x: o.lon + 0.01, y: o.lat - 0.008 },
            Coord { x: o.lon + 0.01, y: o.lat + 0.008 },
            Coord { x: o.lon - 0.01, y: o.lat + 0.008 },
            Coord { x: o.lon - 0.01, y: o.lat - 0.008 },
        ];
        let provider = FixtureIsochroneProvider::new(Polygon::new(LineString::new(ring), vec![]));
        let estimator = ReachabilityEstimator::new(
            ReachabilityPolicy::Isochrone,
            5.0,
            Some(Arc::new(provider)),
            Duration::from_secs(5),
        );
        let area = estimator.estimate(o, 10.0).await;
        assert_eq!(area.shape(), AreaShape::Isochrone);
        assert_eq!(area.provenance(), Provenance::Measured);
    }

    #[tokio::test]
    async fn test_missing_provider_falls_back() {
        let estimator = ReachabilityEstimator::new(
            ReachabilityPolicy::Isochrone,
            5.0,
            None,
            Duration::from_secs(5),
        );
        let area = estimator.estimate(origin(), 10.0).await;
        assert_eq!(area.provenance(), Provenance::Approximate);
    }
}
