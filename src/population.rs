//! Population aggregation by area-weighted apportionment.
//!
//! Grid cells from the census source are clipped against the reachability
//! polygon in a local meter projection; each cell contributes its headcount
//! times the fraction of its area inside the polygon.

use std::sync::Arc;
use std::time::Duration;

use geo::{Area, BooleanOps, BoundingRect};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, warn};

use crate::cache::{CacheKey, GeoCache};
use crate::models::{PopulationFigure, Provenance, ReachabilityArea};
use crate::sources::{with_timeout, PopulationCell, PopulationSource};

/// R-tree wrapper so cells can be pre-filtered by envelope before the exact
/// polygon intersection.
struct IndexedCell {
    cell: PopulationCell,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedCell {
    fn new(cell: PopulationCell) -> Option<Self> {
        let rect = cell.geometry.bounding_rect()?;
        Some(Self {
            cell,
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        })
    }
}

/// Aggregates population figures for reachability areas, with caching.
pub struct PopulationAggregator {
    source: Arc<dyn PopulationSource>,
    cache: GeoCache,
    cache_ttl: Duration,
    cell_resolution_deg: f64,
    timeout: Duration,
}

impl PopulationAggregator {
    pub fn new(
        source: Arc<dyn PopulationSource>,
        cache: GeoCache,
        cache_ttl: Duration,
        cell_resolution_deg: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            cache_ttl,
            cell_resolution_deg,
            timeout,
        }
    }

    fn cache_key(&self, area: &ReachabilityArea) -> CacheKey {
        let (center, radius) = area.bounding_circle();
        // Radius rounded to 10m so equivalent time budgets share entries
        CacheKey::for_cell(
            "population",
            center,
            self.cell_resolution_deg,
            &format!("r{:.0}", radius / 10.0),
        )
    }

    /// Estimate the population living inside `area`.
    ///
    /// Cache-first; a source failure or timeout yields an `unavailable`
    /// figure rather than an error, and is not cached.
    pub async fn population_within(&self, area: &ReachabilityArea) -> PopulationFigure {
        let key = self.cache_key(area);
        if let Some(figure) = self.cache.get::<PopulationFigure>(&key).await {
            return figure;
        }

        let cells = match with_timeout(self.timeout, self.source.fetch_cells(area.bbox())).await {
            Ok(cells) => cells,
            Err(e) => {
                warn!("population source failed for {}: {}", area.origin(), e);
                return PopulationFigure::unavailable();
            }
        };

        let headcount = apportion(area, cells);
        let provenance = match area.provenance() {
            // An approximate area makes the figure approximate too
            Provenance::Approximate => Provenance::Approximate,
            _ => Provenance::Measured,
        };

        debug!(
            "apportioned {:.0} inhabitants around {}",
            headcount,
            area.origin()
        );

        let figure = PopulationFigure::new(headcount, provenance, self.source.name());
        self.cache.put(&key, &figure, self.cache_ttl).await;
        figure
    }
}

/// Area-weighted apportionment of grid cells over the reachability polygon.
fn apportion(area: &ReachabilityArea, cells: Vec<PopulationCell>) -> f64 {
    let proj = crate::geometry::LocalProjection::new(area.origin());
    let area_local = proj.project_polygon(area.polygon());

    let tree = RTree::bulk_load(cells.into_iter().filter_map(IndexedCell::new).collect());

    let bbox = area.bbox();
    let query = AABB::from_corners(
        [bbox.min().x, bbox.min().y],
        [bbox.max().x, bbox.max().y],
    );

    let mut total = 0.0;
    for indexed in tree.locate_in_envelope_intersecting(&query) {
        let cell_local = proj.project_polygon(&indexed.cell.geometry);
        let cell_area = cell_local.unsigned_area();
        if cell_area <= 0.0 {
            continue;
        }

        let overlap = area_local
            .intersection(&cell_local)
            .unsigned_area();
        if overlap > 0.0 {
            total += indexed.cell.population * (overlap / cell_area);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::circle_bbox;
    use crate::models::GeoPoint;
    use crate::sources::fixtures::FixturePopulationSource;
    use geo::{Coord, Rect};

    fn origin() -> GeoPoint {
        GeoPoint::new(45.76, 4.83)
    }

    fn area() -> ReachabilityArea {
        ReachabilityArea::from_circle(origin(), 800.0, Provenance::Measured)
    }

    fn aggregator(source: Arc<FixturePopulationSource>) -> PopulationAggregator {
        PopulationAggregator::new(
            source,
            GeoCache::in_memory(),
            Duration::from_secs(3600),
            0.005,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_apportionment_full_containment() {
        // A tiny cell fully inside the circle contributes everything
        let cell = PopulationCell {
            geometry: Rect::new(
                Coord { x: 4.8295, y: 45.7595 },
                Coord { x: 4.8305, y: 45.7605 },
            )
            .to_polygon(),
            population: 1000.0,
        };
        let total = apportion(&area(), vec![cell]);
        assert!((total - 1000.0).abs() < 1.0, "got {}", total);
    }

    #[test]
    fn test_apportionment_outside_cell_contributes_nothing() {
        let cell = PopulationCell {
            geometry: Rect::new(Coord { x: 4.90, y: 45.80 }, Coord { x: 4.91, y: 45.81 })
                .to_polygon(),
            population: 1000.0,
        };
        assert_eq!(apportion(&area(), vec![cell]), 0.0);
    }

    #[test]
    fn test_apportionment_partial_overlap_is_weighted() {
        // Cell covering the whole circle bbox: the circle covers pi/4 of it
        let cell = PopulationCell {
            geometry: circle_bbox(origin(), 800.0).to_polygon(),
            population: 1000.0,
        };
        let total = apportion(&area(), vec![cell]);
        let expected = 1000.0 * std::f64::consts::PI / 4.0;
        assert!((total - expected).abs() < 20.0, "got {}", total);
    }

    #[tokio::test]
    async fn test_source_failure_degrades() {
        let source = Arc::new(FixturePopulationSource::uniform_density(10_000.0));
        source.set_failing(true);
        let aggregator = aggregator(source);

        let figure = aggregator.population_within(&area()).await;
        assert_eq!(figure.headcount, 0.0);
        assert!(figure.provenance.is_unavailable());
    }

    #[tokio::test]
    async fn test_cache_absorbs_repeat_lookups() {
        let source = Arc::new(FixturePopulationSource::uniform_density(10_000.0));
        let aggregator = aggregator(source.clone());

        let first = aggregator.population_within(&area()).await;
        let second = aggregator.population_within(&area()).await;
        assert_eq!(first.headcount, second.headcount);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = Arc::new(FixturePopulationSource::uniform_density(10_000.0));
        source.set_failing(true);
        let aggregator = aggregator(source.clone());

        assert!(aggregator
            .population_within(&area())
            .await
            .provenance
            .is_unavailable());

        // Source recovers; next lookup must refetch, not replay the failure
        source.set_failing(false);
        let figure = aggregator.population_within(&area()).await;
        assert!(figure.headcount > 0.0);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_approximate_area_taints_figure() {
        let source = Arc::new(FixturePopulationSource::uniform_density(10_000.0));
        let aggregator = aggregator(source);

        let approx = ReachabilityArea::from_circle(origin(), 800.0, Provenance::Approximate);
        let figure = aggregator.population_within(&approx).await;
        assert_eq!(figure.provenance, Provenance::Approximate);
    }
}
