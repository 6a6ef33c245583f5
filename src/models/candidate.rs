//! Candidate locations and their scored results.

use serde::{Deserialize, Serialize};

use super::{CompetitorRecord, DensityScore, GeoPoint, PopulationFigure};

/// A point under evaluation, the unit of work for the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLocation {
    pub point: GeoPoint,
    /// Human-readable address if known; filled by reverse geocoding when
    /// available, left empty otherwise.
    pub address: Option<String>,
}

impl CandidateLocation {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            point,
            address: None,
        }
    }

    pub fn with_address(point: GeoPoint, address: impl Into<String>) -> Self {
        Self {
            point,
            address: Some(address.into()),
        }
    }
}

/// Per-signal normalized components of a composite score, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub population: f64,
    pub competition: f64,
    pub density: f64,
}

/// A candidate with its three sub-scores and composite score.
///
/// Immutable once produced; discarded after the ranked list is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateLocation,
    pub population: PopulationFigure,
    pub competitors: Vec<CompetitorRecord>,
    pub competitor_count: usize,
    pub density: DensityScore,
    pub components: ScoreComponents,
    /// Weighted composite in [0, 1].
    pub score: f64,
    /// True when at least one signal came from a failed or timed-out source.
    /// Degraded candidates stay in the ranking; the caller decides whether to
    /// show low-confidence results.
    pub degraded: bool,
}

impl ScoredCandidate {
    /// Closest detected competitor, if any.
    pub fn nearest_competitor(&self) -> Option<&CompetitorRecord> {
        self.competitors.first()
    }
}
