//! Composite scoring and ranking.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::models::{
    CandidateLocation, CompetitorRecord, DensityScore, PopulationFigure, ScoreComponents,
    ScoredCandidate,
};

const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Relative weights of the three signals. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub population: f64,
    pub competition: f64,
    pub density: f64,
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, w) in [
            ("population", self.population),
            ("competition", self.competition),
            ("density", self.density),
        ] {
            if !(0.0..=1.0).contains(&w) || !w.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "weight {} must be in [0, 1], got {}",
                    name, w
                )));
            }
        }

        let sum = self.population + self.competition + self.density;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(EngineError::Configuration(format!(
                "weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            population: 0.4,
            competition: 0.4,
            density: 0.2,
        }
    }
}

/// The raw signals collected for one candidate, before scoring.
///
/// `competitors` is `None` when the places source failed for this candidate;
/// an empty list means the area genuinely has no competitors.
#[derive(Debug, Clone)]
pub struct CandidateSignals {
    pub candidate: CandidateLocation,
    pub population: PopulationFigure,
    pub competitors: Option<Vec<CompetitorRecord>>,
    pub density: DensityScore,
}

/// Combines the three signals into a weighted composite and ranks candidates.
pub struct ScoringEngine {
    weights: ScoringWeights,
    /// Headcount below which the population component is 0.
    population_floor: f64,
    /// Headcount at which the population component saturates at 1.
    population_saturation: f64,
}

impl ScoringEngine {
    pub fn new(
        weights: ScoringWeights,
        population_floor: f64,
        population_saturation: f64,
    ) -> Result<Self, EngineError> {
        weights.validate()?;
        if population_floor < 0.0 || !population_floor.is_finite() {
            return Err(EngineError::Configuration(format!(
                "population floor must be non-negative, got {}",
                population_floor
            )));
        }
        if population_saturation <= population_floor {
            return Err(EngineError::Configuration(format!(
                "population saturation ({}) must exceed the floor ({})",
                population_saturation, population_floor
            )));
        }
        Ok(Self {
            weights,
            population_floor,
            population_saturation,
        })
    }

    /// Linear ramp from the floor to the saturation point, clamped to [0, 1].
    fn population_component(&self, figure: &PopulationFigure) -> f64 {
        if figure.provenance.is_unavailable() {
            return 0.0;
        }
        ((figure.headcount - self.population_floor)
            / (self.population_saturation - self.population_floor))
            .clamp(0.0, 1.0)
    }

    /// 1.0 for no competition, decaying as competitors accumulate. One
    /// competitor still leaves half the component, so it is not fatal.
    fn competition_component(count: usize) -> f64 {
        1.0 / (1.0 + count as f64)
    }

    /// Score a single candidate from its collected signals.
    pub fn score(&self, signals: CandidateSignals) -> ScoredCandidate {
        let CandidateSignals {
            candidate,
            population,
            competitors,
            density,
        } = signals;

        let population_component = self.population_component(&population);

        let (competitors, competition_component, competitors_failed) = match competitors {
            Some(list) => {
                let component = Self::competition_component(list.len());
                (list, component, false)
            }
            None => (Vec::new(), 0.0, true),
        };

        let density_component = density.value;

        let components = ScoreComponents {
            population: population_component,
            competition: competition_component,
            density: density_component,
        };

        let score = (self.weights.population * components.population
            + self.weights.competition * components.competition
            + self.weights.density * components.density)
            .clamp(0.0, 1.0);

        let degraded = population.provenance.is_unavailable()
            || competitors_failed
            || density.provenance.is_unavailable();

        debug!(
            "scored {} -> {:.3} (pop {:.3}, comp {:.3}, dens {:.3}{})",
            candidate.point,
            score,
            components.population,
            components.competition,
            components.density,
            if degraded { ", degraded" } else { "" }
        );

        ScoredCandidate {
            candidate,
            population,
            competitor_count: competitors.len(),
            competitors,
            density,
            components,
            score,
            degraded,
        }
    }

    /// Score a batch and rank it, best first.
    ///
    /// The sort is stable and descending by composite score, so candidates
    /// with equal scores keep their insertion order and repeat runs over a
    /// warm cache produce identical rankings.
    pub fn rank(&self, batch: Vec<CandidateSignals>) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> =
            batch.into_iter().map(|signals| self.score(signals)).collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Provenance};

    fn weights() -> ScoringWeights {
        ScoringWeights {
            population: 0.4,
            competition: 0.4,
            density: 0.2,
        }
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(weights(), 2000.0, 6000.0).unwrap()
    }

    fn candidate(lat: f64) -> CandidateLocation {
        CandidateLocation::new(GeoPoint::new(lat, 4.83))
    }

    fn competitor(i: usize) -> CompetitorRecord {
        CompetitorRecord {
            name: format!("laverie {}", i),
            location: GeoPoint::new(45.761, 4.831),
            category: "laundry".to_string(),
            distance_m: 150.0,
        }
    }

    fn signals(
        headcount: f64,
        competitor_count: usize,
        density_value: f64,
    ) -> CandidateSignals {
        CandidateSignals {
            candidate: candidate(45.76),
            population: PopulationFigure::new(headcount, Provenance::Measured, "census-grid"),
            competitors: Some((0..competitor_count).map(competitor).collect()),
            density: DensityScore {
                value: density_value,
                raw_density: density_value * 5000.0,
                provenance: Provenance::Measured,
            },
        }
    }

    #[test]
    fn test_valid_weights_accepted() {
        for (p, c, d) in [(0.4, 0.4, 0.2), (1.0, 0.0, 0.0), (0.3333, 0.3333, 0.3334)] {
            let w = ScoringWeights {
                population: p,
                competition: c,
                density: d,
            };
            assert!(w.validate().is_ok(), "{:?}", w);
        }
    }

    #[test]
    fn test_invalid_weights_rejected() {
        for (p, c, d) in [(0.4, 0.4, 0.4), (0.5, 0.3, 0.1), (0.0, 0.0, 0.0), (-0.2, 1.0, 0.2)] {
            let w = ScoringWeights {
                population: p,
                competition: c,
                density: d,
            };
            assert!(
                matches!(w.validate(), Err(EngineError::Configuration(_))),
                "{:?}",
                w
            );
        }
    }

    #[test]
    fn test_saturation_must_exceed_floor() {
        assert!(ScoringEngine::new(weights(), 2000.0, 2000.0).is_err());
        assert!(ScoringEngine::new(weights(), 2000.0, 1000.0).is_err());
    }

    #[test]
    fn test_worked_example_no_competition() {
        // Population at the saturation point, no competitors, density 0.5:
        // 0.4*1.0 + 0.4*1.0 + 0.2*0.5 = 0.90
        let scored = engine().score(signals(6000.0, 0, 0.5));
        assert!((scored.score - 0.90).abs() < 1e-9, "got {}", scored.score);
        assert_eq!(scored.components.competition, 1.0);
        assert!(!scored.degraded);
    }

    #[test]
    fn test_worked_example_three_competitors() {
        // Same candidate with 3 competitors: 0.4*1.0 + 0.4*0.25 + 0.2*0.5 = 0.60
        let scored = engine().score(signals(6000.0, 3, 0.5));
        assert!((scored.score - 0.60).abs() < 1e-9, "got {}", scored.score);
        assert_eq!(scored.components.competition, 0.25);
    }

    #[test]
    fn test_population_below_floor_scores_zero() {
        let scored = engine().score(signals(1500.0, 0, 0.0));
        assert_eq!(scored.components.population, 0.0);
    }

    #[test]
    fn test_population_monotonicity() {
        let mut previous = -1.0;
        for headcount in [0.0, 2000.0, 3000.0, 4500.0, 6000.0, 9000.0] {
            let scored = engine().score(signals(headcount, 2, 0.5));
            assert!(
                scored.score >= previous,
                "composite dropped at headcount {}",
                headcount
            );
            previous = scored.score;
        }
    }

    #[test]
    fn test_competition_monotonicity() {
        let mut previous = 2.0;
        for count in [0, 1, 2, 5, 10] {
            let scored = engine().score(signals(6000.0, count, 0.5));
            assert!(
                scored.score <= previous,
                "composite rose at competitor count {}",
                count
            );
            previous = scored.score;
        }
        // count=0 maxes the component
        assert_eq!(engine().score(signals(6000.0, 0, 0.5)).components.competition, 1.0);
    }

    #[test]
    fn test_composite_in_unit_interval() {
        for (h, c, d) in [(0.0, 0, 0.0), (1e9, 0, 1.0), (6000.0, 100, 0.3)] {
            let scored = engine().score(signals(h, c, d));
            assert!((0.0..=1.0).contains(&scored.score));
        }
    }

    #[test]
    fn test_failed_competitor_source_degrades() {
        let mut s = signals(6000.0, 0, 0.5);
        s.competitors = None;
        let scored = engine().score(s);
        assert!(scored.degraded);
        assert_eq!(scored.components.competition, 0.0);
        assert_eq!(scored.competitor_count, 0);
    }

    #[test]
    fn test_rank_descending_with_stable_ties() {
        let batch = vec![
            signals(3000.0, 1, 0.5),  // mid
            signals(6000.0, 0, 0.5),  // best
            signals(3000.0, 1, 0.5),  // tie with first
        ];
        let mut batch = batch;
        batch[0].candidate = candidate(45.70);
        batch[2].candidate = candidate(45.72);

        let ranked = engine().rank(batch);
        assert_eq!(ranked[0].candidate.point.lat, 45.76); // the best one
        // Tied candidates keep insertion order
        assert_eq!(ranked[1].candidate.point.lat, 45.70);
        assert_eq!(ranked[2].candidate.point.lat, 45.72);
    }

    #[test]
    fn test_unscoreable_candidate_ranks_last_but_stays() {
        let dead = CandidateSignals {
            candidate: candidate(45.70),
            population: PopulationFigure::unavailable(),
            competitors: None,
            density: DensityScore::unavailable(),
        };
        let ranked = engine().rank(vec![dead, signals(6000.0, 0, 0.5)]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].score, 0.0);
        assert!(ranked[1].degraded);
    }
}
