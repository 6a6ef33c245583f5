//! Planar geometry helpers for WGS84 coordinates.
//!
//! Areas and overlaps are computed in a local equirectangular projection
//! centered on the point of interest. Over walking-distance extents (a few
//! kilometers) the distortion is negligible and it keeps polygon clipping in
//! plain meters.

use geo::{Coord, LineString, Polygon, Rect};

use crate::models::GeoPoint;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude.
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Great-circle distance between two points, in meters.
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Local projection from lat/lon degrees into meters around an origin.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: GeoPoint,
    meters_per_deg_lon: f64,
}

impl LocalProjection {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            meters_per_deg_lon: METERS_PER_DEG_LAT * origin.lat.to_radians().cos(),
        }
    }

    /// Project a point into local meters (x east, y north).
    pub fn to_local(&self, p: GeoPoint) -> Coord<f64> {
        Coord {
            x: (p.lon - self.origin.lon) * self.meters_per_deg_lon,
            y: (p.lat - self.origin.lat) * METERS_PER_DEG_LAT,
        }
    }

    /// Inverse of [`to_local`](Self::to_local).
    pub fn to_wgs84(&self, c: Coord<f64>) -> GeoPoint {
        GeoPoint::new(
            self.origin.lat + c.y / METERS_PER_DEG_LAT,
            self.origin.lon + c.x / self.meters_per_deg_lon,
        )
    }

    /// Project a lat/lon polygon into local meters.
    pub fn project_polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        let exterior = LineString::new(
            polygon
                .exterior()
                .coords()
                .map(|c| self.to_local(GeoPoint::new(c.y, c.x)))
                .collect(),
        );
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| {
                LineString::new(
                    ring.coords()
                        .map(|c| self.to_local(GeoPoint::new(c.y, c.x)))
                        .collect(),
                )
            })
            .collect();
        Polygon::new(exterior, interiors)
    }
}

/// Tessellate a circle around `center` into a closed lat/lon polygon.
pub fn circle_polygon(center: GeoPoint, radius_m: f64, segments: usize) -> Polygon<f64> {
    let proj = LocalProjection::new(center);
    let mut ring: Vec<Coord<f64>> = Vec::with_capacity(segments + 1);

    for i in 0..segments {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (segments as f64);
        let p = proj.to_wgs84(Coord {
            x: radius_m * theta.cos(),
            y: radius_m * theta.sin(),
        });
        ring.push(Coord { x: p.lon, y: p.lat });
    }
    ring.push(ring[0]);

    Polygon::new(LineString::new(ring), vec![])
}

/// Axis-aligned bbox covering a circle, in lat/lon degrees.
pub fn circle_bbox(center: GeoPoint, radius_m: f64) -> Rect<f64> {
    let dlat = radius_m / METERS_PER_DEG_LAT;
    let dlon = radius_m / (METERS_PER_DEG_LAT * center.lat.to_radians().cos());
    Rect::new(
        Coord {
            x: center.lon - dlon,
            y: center.lat - dlat,
        },
        Coord {
            x: center.lon + dlon,
            y: center.lat + dlat,
        },
    )
}

/// Snap a point to a grid cell of `resolution_deg` degrees.
///
/// Nearby points share a cell, which is what lets cache entries be reused
/// across overlapping candidate evaluations.
pub fn snap_to_cell(p: GeoPoint, resolution_deg: f64) -> (i64, i64) {
    (
        (p.lat / resolution_deg).floor() as i64,
        (p.lon / resolution_deg).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains, Point};

    #[test]
    fn test_haversine_known_distance() {
        // Paris -> Marseille, roughly 660 km
        let paris = GeoPoint::new(48.8566, 2.3522);
        let marseille = GeoPoint::new(43.2965, 5.3698);
        let d = haversine_distance_m(paris, marseille);
        assert!((d - 660_000.0).abs() < 10_000.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero() {
        let p = GeoPoint::new(45.0, 5.0);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn test_projection_roundtrip() {
        let origin = GeoPoint::new(45.76, 4.83);
        let proj = LocalProjection::new(origin);
        let p = GeoPoint::new(45.77, 4.85);
        let back = proj.to_wgs84(proj.to_local(p));
        assert!((back.lat - p.lat).abs() < 1e-9);
        assert!((back.lon - p.lon).abs() < 1e-9);
    }

    #[test]
    fn test_projection_distance_agrees_with_haversine() {
        let origin = GeoPoint::new(45.76, 4.83);
        let proj = LocalProjection::new(origin);
        let p = GeoPoint::new(45.765, 4.838);
        let local = proj.to_local(p);
        let planar = (local.x.powi(2) + local.y.powi(2)).sqrt();
        let spherical = haversine_distance_m(origin, p);
        assert!((planar - spherical).abs() / spherical < 0.01);
    }

    #[test]
    fn test_circle_polygon_contains_center() {
        let center = GeoPoint::new(45.76, 4.83);
        let poly = circle_polygon(center, 800.0, 64);
        assert!(poly.contains(&Point::new(center.lon, center.lat)));
    }

    #[test]
    fn test_circle_polygon_area() {
        let center = GeoPoint::new(45.76, 4.83);
        let poly = circle_polygon(center, 800.0, 128);
        let local = LocalProjection::new(center).project_polygon(&poly);
        let expected = std::f64::consts::PI * 800.0 * 800.0;
        assert!((local.unsigned_area() - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_snap_to_cell_groups_nearby_points() {
        let a = GeoPoint::new(45.7601, 4.8302);
        let b = GeoPoint::new(45.7603, 4.8304);
        let far = GeoPoint::new(45.80, 4.90);
        assert_eq!(snap_to_cell(a, 0.005), snap_to_cell(b, 0.005));
        assert_ne!(snap_to_cell(a, 0.005), snap_to_cell(far, 0.005));
    }

    #[test]
    fn test_snap_to_cell_negative_coords() {
        let p = GeoPoint::new(-33.45, -70.66);
        let (row, col) = snap_to_cell(p, 0.01);
        assert!(row < 0 && col < 0);
    }
}
