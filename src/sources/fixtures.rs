//! Deterministic fixture adapters.
//!
//! Same contracts as the network adapters, but fully in-memory and
//! reproducible. Used by the test suite and usable by consumers for offline
//! or demo runs. Each fixture counts its calls so tests can assert that the
//! cache actually absorbed repeat lookups, and can be switched into a failing
//! state to exercise degradation paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use geo::{Area, Polygon, Rect};
use hashbrown::HashMap;

use crate::error::SourceError;
use crate::geometry::LocalProjection;
use crate::models::GeoPoint;
use crate::sources::{
    DensitySource, Geocoder, IsochroneProvider, PlaceHit, PlacesSource, PopulationCell,
    PopulationSource, ResolvedArea,
};

/// Population grid backed by explicit cells or a uniform density.
pub struct FixturePopulationSource {
    cells: Vec<PopulationCell>,
    uniform_density_per_km2: Option<f64>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FixturePopulationSource {
    pub fn with_cells(cells: Vec<PopulationCell>) -> Self {
        Self {
            cells,
            uniform_density_per_km2: None,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Every bbox query returns one cell covering the bbox, populated at a
    /// uniform density.
    pub fn uniform_density(density_per_km2: f64) -> Self {
        Self {
            cells: Vec::new(),
            uniform_density_per_km2: Some(density_per_km2),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PopulationSource for FixturePopulationSource {
    async fn fetch_cells(&self, bbox: Rect<f64>) -> Result<Vec<PopulationCell>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("fixture population source down"));
        }

        if let Some(density) = self.uniform_density_per_km2 {
            let geometry = bbox.to_polygon();
            let area_km2 = planar_area_m2(&geometry) / 1.0e6;
            return Ok(vec![PopulationCell {
                geometry,
                population: density * area_km2,
            }]);
        }

        Ok(self.cells.clone())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Planar area of a lat/lon polygon, in m².
fn planar_area_m2(polygon: &Polygon<f64>) -> f64 {
    let Some(first) = polygon.exterior().0.first() else {
        return 0.0;
    };
    let proj = LocalProjection::new(GeoPoint::new(first.y, first.x));
    proj.project_polygon(polygon).unsigned_area()
}

/// Places provider with a fixed hit list.
pub struct FixturePlacesSource {
    hits: Vec<PlaceHit>,
    /// Fail any search whose center is within the given distance of a point.
    /// Lets a test break the source for one candidate out of a batch.
    fail_near: Option<(GeoPoint, f64)>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FixturePlacesSource {
    pub fn new(hits: Vec<PlaceHit>) -> Self {
        Self {
            hits,
            fail_near: None,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn failing_near(mut self, point: GeoPoint, radius_m: f64) -> Self {
        self.fail_near = Some((point, radius_m));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlacesSource for FixturePlacesSource {
    async fn search(
        &self,
        center: GeoPoint,
        radius_m: f64,
        _keywords: &[String],
    ) -> Result<Vec<PlaceHit>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("fixture places source down"));
        }
        if let Some((point, r)) = self.fail_near {
            if center.distance_m(point) <= r {
                return Err(SourceError::unavailable("fixture places source down here"));
            }
        }

        Ok(self
            .hits
            .iter()
            .filter(|hit| hit.location.distance_m(center) <= radius_m)
            .cloned()
            .collect())
    }
}

/// Density source returning one fixed value everywhere.
pub struct FixtureDensitySource {
    density_per_km2: f64,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FixtureDensitySource {
    pub fn new(density_per_km2: f64) -> Self {
        Self {
            density_per_km2,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DensitySource for FixtureDensitySource {
    async fn density_at(&self, _point: GeoPoint) -> Result<f64, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("fixture density source down"));
        }
        Ok(self.density_per_km2)
    }
}

/// Geocoder over a fixed table of known areas.
pub struct FixtureGeocoder {
    areas: HashMap<String, ResolvedArea>,
}

impl FixtureGeocoder {
    pub fn new() -> Self {
        Self {
            areas: HashMap::new(),
        }
    }

    pub fn with_area(mut self, query: &str, center: GeoPoint, radius_m: f64) -> Self {
        self.areas.insert(
            query.to_string(),
            ResolvedArea {
                center,
                radius_m,
                label: query.to_string(),
            },
        );
        self
    }
}

impl Default for FixtureGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for FixtureGeocoder {
    async fn resolve_area(&self, query: &str) -> Result<ResolvedArea, SourceError> {
        self.areas
            .get(query)
            .cloned()
            .ok_or_else(|| SourceError::unavailable(format!("unknown area {:?}", query)))
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, SourceError> {
        Ok(Some(format!("{:.5} / {:.5}", point.lat, point.lon)))
    }
}

/// Isochrone provider that always fails, forcing the radius fallback.
pub struct UnavailableIsochroneProvider;

#[async_trait]
impl IsochroneProvider for UnavailableIsochroneProvider {
    async fn isochrone(
        &self,
        _origin: GeoPoint,
        _minutes: f64,
        _speed_kmh: f64,
    ) -> Result<Polygon<f64>, SourceError> {
        Err(SourceError::unavailable("no routing data"))
    }
}

/// Isochrone provider returning a fixed polygon.
pub struct FixtureIsochroneProvider {
    polygon: Polygon<f64>,
}

impl FixtureIsochroneProvider {
    pub fn new(polygon: Polygon<f64>) -> Self {
        Self { polygon }
    }
}

#[async_trait]
impl IsochroneProvider for FixtureIsochroneProvider {
    async fn isochrone(
        &self,
        _origin: GeoPoint,
        _minutes: f64,
        _speed_kmh: f64,
    ) -> Result<Polygon<f64>, SourceError> {
        Ok(self.polygon.clone())
    }
}
