//! Walking-distance reachability areas.

use geo::{Contains, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use super::{GeoPoint, Provenance};
use crate::geometry::{circle_bbox, circle_polygon};

/// Number of segments used to tessellate a radius circle.
const CIRCLE_SEGMENTS: usize = 64;

/// Geometric origin of a reachability area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaShape {
    /// Radius approximation around the origin.
    Circle,
    /// Polygon derived from the pedestrian network.
    Isochrone,
}

/// Area reachable on foot from an origin point within a time budget.
///
/// Always carries a polygon (circles are tessellated) so population
/// apportionment and competitor filtering work the same way regardless of how
/// the area was obtained. Guaranteed non-empty and to contain its origin.
#[derive(Debug, Clone)]
pub struct ReachabilityArea {
    origin: GeoPoint,
    polygon: Polygon<f64>,
    /// Radius of the bounding circle around the origin, in meters.
    bounding_radius_m: f64,
    shape: AreaShape,
    provenance: Provenance,
}

impl ReachabilityArea {
    /// Radius approximation: a circle of `radius_m` around the origin.
    pub fn from_circle(origin: GeoPoint, radius_m: f64, provenance: Provenance) -> Self {
        let radius_m = radius_m.max(1.0);
        Self {
            origin,
            polygon: circle_polygon(origin, radius_m, CIRCLE_SEGMENTS),
            bounding_radius_m: radius_m,
            shape: AreaShape::Circle,
            provenance,
        }
    }

    /// Network-aware isochrone polygon.
    ///
    /// Returns `None` if the polygon is degenerate or does not contain the
    /// origin; the caller falls back to the radius approximation.
    pub fn from_isochrone(origin: GeoPoint, polygon: Polygon<f64>) -> Option<Self> {
        if polygon.exterior().0.len() < 4 {
            return None;
        }
        if !polygon.contains(&Point::new(origin.lon, origin.lat)) {
            return None;
        }

        let bounding_radius_m = polygon
            .exterior()
            .coords()
            .map(|c| origin.distance_m(GeoPoint::new(c.y, c.x)))
            .fold(0.0_f64, f64::max);

        Some(Self {
            origin,
            polygon,
            bounding_radius_m,
            shape: AreaShape::Isochrone,
            provenance: Provenance::Measured,
        })
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn shape(&self) -> AreaShape {
        self.shape
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Center and radius of the bounding circle, in meters.
    ///
    /// Places providers take center+radius, not polygons, so radius queries
    /// are bounded by this circle and post-filtered with [`contains`](Self::contains).
    pub fn bounding_circle(&self) -> (GeoPoint, f64) {
        (self.origin, self.bounding_radius_m)
    }

    /// Lat/lon bbox covering the whole area.
    pub fn bbox(&self) -> Rect<f64> {
        circle_bbox(self.origin, self.bounding_radius_m)
    }

    /// Exact point-in-polygon test.
    pub fn contains(&self, p: GeoPoint) -> bool {
        self.polygon.contains(&Point::new(p.lon, p.lat))
    }
}
