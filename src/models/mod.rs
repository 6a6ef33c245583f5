//! Core data model shared across the scoring pipeline.

mod area;
mod candidate;

pub use area::{AreaShape, ReachabilityArea};
pub use candidate::{CandidateLocation, ScoreComponents, ScoredCandidate};

use serde::{Deserialize, Serialize};

use crate::geometry::haversine_distance_m;

/// Geographic point (WGS84 decimal degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point, in meters.
    pub fn distance_m(&self, other: GeoPoint) -> f64 {
        haversine_distance_m(*self, other)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// How a value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Computed from real source data.
    Measured,
    /// Fallback estimate (e.g. radius circle instead of an isochrone).
    Approximate,
    /// The source failed or timed out; the value is a placeholder.
    Unavailable,
}

impl Provenance {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Provenance::Unavailable)
    }
}

/// Aggregated headcount estimate for a reachability area.
///
/// Derived by area-weighted apportionment of population grid cells, so the
/// figure is an estimate, not a census count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationFigure {
    /// Estimated headcount. Never negative.
    pub headcount: f64,
    pub provenance: Provenance,
    /// Data-source tag, e.g. "census-grid".
    pub source: String,
}

impl PopulationFigure {
    pub fn new(headcount: f64, provenance: Provenance, source: impl Into<String>) -> Self {
        Self {
            headcount: headcount.max(0.0),
            provenance,
            source: source.into(),
        }
    }

    /// Placeholder figure for a failed or timed-out source.
    pub fn unavailable() -> Self {
        Self {
            headcount: 0.0,
            provenance: Provenance::Unavailable,
            source: "none".to_string(),
        }
    }
}

/// An existing business of the searched category near a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub name: String,
    pub location: GeoPoint,
    pub category: String,
    /// Distance from the candidate point, in meters.
    pub distance_m: f64,
}

/// Normalized residential density in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityScore {
    /// Normalized value, monotonic in the underlying inhabitants/km².
    pub value: f64,
    /// Raw density as reported by the source (units or inhabitants per km²).
    pub raw_density: f64,
    pub provenance: Provenance,
}

impl DensityScore {
    pub fn new(raw_density: f64, threshold: f64) -> Self {
        Self {
            value: (raw_density / threshold).clamp(0.0, 1.0),
            raw_density,
            provenance: Provenance::Measured,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: 0.0,
            raw_density: 0.0,
            provenance: Provenance::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_figure_never_negative() {
        let figure = PopulationFigure::new(-12.0, Provenance::Measured, "census-grid");
        assert_eq!(figure.headcount, 0.0);
    }

    #[test]
    fn test_density_score_clamped() {
        assert_eq!(DensityScore::new(12_000.0, 5_000.0).value, 1.0);
        assert_eq!(DensityScore::new(-3.0, 5_000.0).value, 0.0);
    }

    #[test]
    fn test_density_score_monotonic() {
        let low = DensityScore::new(1_000.0, 5_000.0);
        let high = DensityScore::new(2_500.0, 5_000.0);
        assert!(high.value > low.value);
    }

    #[test]
    fn test_unavailable_markers() {
        assert!(PopulationFigure::unavailable().provenance.is_unavailable());
        assert!(DensityScore::unavailable().provenance.is_unavailable());
    }
}
