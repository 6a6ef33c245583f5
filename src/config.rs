//! Engine configuration.
//!
//! Loaded from TOML; every section has defaults matching a 10-minute-walk
//! retail siting study, so a minimal file only overrides what it cares about.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::EngineError;
use crate::reach::ReachabilityPolicy;
use crate::scoring::ScoringWeights;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RankConfig {
    pub walking: WalkingConfig,
    pub weights: ScoringWeights,
    pub thresholds: ThresholdConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkingConfig {
    pub speed_kmh: f64,
    pub time_budget_min: f64,
    pub policy: ReachabilityPolicy,
}

impl Default for WalkingConfig {
    fn default() -> Self {
        Self {
            speed_kmh: 5.0,
            time_budget_min: 10.0,
            policy: ReachabilityPolicy::Radius,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Headcount below which a candidate's population component is 0.
    pub population_floor: f64,
    /// Headcount at which the population component saturates at 1.
    pub population_saturation: f64,
    /// Raw density (units/km²) at which the density score saturates at 1.
    pub density_threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            population_floor: 2000.0,
            population_saturation: 6000.0,
            density_threshold: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Grid cell size for cache keys; nearby lookups share a cell.
    pub cell_resolution_deg: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            cell_resolution_deg: 0.005,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate grid spacing in meters.
    pub spacing_m: f64,
    /// Hard cap on grid candidates; oversized areas get a coarser grid.
    pub max_candidates: usize,
    /// Concurrent candidate evaluations in flight.
    pub max_in_flight: usize,
    /// Per-call timeout for external sources.
    pub source_timeout_secs: u64,
    /// Call budget for the rate-limited places provider.
    pub places_calls_per_second: f64,
    /// Keywords identifying competing establishments.
    pub competitor_keywords: Vec<String>,
    /// Reverse-geocode unlabeled candidates (one extra cached lookup each).
    pub resolve_addresses: bool,
    /// Seed extra candidates from high-density residential spots found by a
    /// coarse probe of the area.
    pub seed_residential: bool,
    /// Minimum normalized density for a probe to become a seed candidate.
    pub residential_seed_floor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            spacing_m: 250.0,
            max_candidates: 225,
            max_in_flight: 8,
            source_timeout_secs: 10,
            places_calls_per_second: 5.0,
            competitor_keywords: vec![
                "laverie".to_string(),
                "laundromat".to_string(),
                "pressing".to_string(),
            ],
            resolve_addresses: false,
            seed_residential: false,
            residential_seed_floor: 0.5,
        }
    }
}

impl SearchConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl RankConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: RankConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Reject bad weights and thresholds before any work begins.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.weights.validate()?;

        if self.walking.speed_kmh <= 0.0 || self.walking.time_budget_min <= 0.0 {
            return Err(EngineError::Configuration(
                "walking speed and time budget must be positive".to_string(),
            ));
        }
        if self.thresholds.population_saturation <= self.thresholds.population_floor {
            return Err(EngineError::Configuration(format!(
                "population saturation ({}) must exceed the floor ({})",
                self.thresholds.population_saturation, self.thresholds.population_floor
            )));
        }
        if self.thresholds.density_threshold <= 0.0 {
            return Err(EngineError::Configuration(
                "density threshold must be positive".to_string(),
            ));
        }
        if self.search.spacing_m <= 0.0 {
            return Err(EngineError::Configuration(
                "candidate spacing must be positive".to_string(),
            ));
        }
        if self.search.max_candidates == 0 {
            return Err(EngineError::Configuration(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if self.search.places_calls_per_second <= 0.0 {
            return Err(EngineError::Configuration(
                "places call budget must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.search.residential_seed_floor) {
            return Err(EngineError::Configuration(
                "residential seed floor must be in [0, 1]".to_string(),
            ));
        }
        if self.search.max_in_flight == 0 {
            return Err(EngineError::Configuration(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.cache.cell_resolution_deg <= 0.0 {
            return Err(EngineError::Configuration(
                "cache cell resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
