//! Search orchestration: candidate generation, concurrent evaluation, ranking.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::cache::{CacheKey, GeoCache};
use crate::candidates::CandidateGenerator;
use crate::competitors::CompetitorDetector;
use crate::config::RankConfig;
use crate::density::DensityEvaluator;
use crate::error::EngineError;
use crate::models::{CandidateLocation, GeoPoint, ScoredCandidate};
use crate::population::PopulationAggregator;
use crate::reach::ReachabilityEstimator;
use crate::scoring::{CandidateSignals, ScoringEngine};
use crate::sources::{
    DensitySource, Geocoder, IsochroneProvider, PlacesSource, PopulationSource, ResolvedArea,
};

/// Probe grid resolution for residential seeding, per axis.
const RESIDENTIAL_PROBE_RESOLUTION: usize = 10;

/// The external collaborators a ranker needs.
pub struct Sources {
    pub population: Arc<dyn PopulationSource>,
    pub places: Arc<dyn PlacesSource>,
    pub density: Arc<dyn DensitySource>,
    pub geocoder: Arc<dyn Geocoder>,
    /// Optional; without it the isochrone policy degrades to radius circles.
    pub isochrone: Option<Arc<dyn IsochroneProvider>>,
}

/// Ranks candidate locations within a target area.
///
/// Construction validates the configuration and fails fast on bad weights or
/// thresholds. After that, data-source trouble only ever degrades individual
/// candidates. Cancelling a search is dropping the `rank` future: in-flight
/// source calls are abandoned and partial results discarded.
pub struct SiteRanker {
    config: RankConfig,
    cache: GeoCache,
    geocoder: Arc<dyn Geocoder>,
    estimator: ReachabilityEstimator,
    population: PopulationAggregator,
    competitors: CompetitorDetector,
    density: DensityEvaluator,
    generator: CandidateGenerator,
    scoring: ScoringEngine,
}

impl SiteRanker {
    pub fn new(config: RankConfig, sources: Sources, cache: GeoCache) -> Result<Self, EngineError> {
        config.validate()?;

        let scoring = ScoringEngine::new(
            config.weights,
            config.thresholds.population_floor,
            config.thresholds.population_saturation,
        )?;

        let timeout = config.search.source_timeout();
        let ttl = config.cache.ttl();
        let resolution = config.cache.cell_resolution_deg;

        Ok(Self {
            estimator: ReachabilityEstimator::new(
                config.walking.policy,
                config.walking.speed_kmh,
                sources.isochrone,
                timeout,
            ),
            population: PopulationAggregator::new(
                sources.population,
                cache.clone(),
                ttl,
                resolution,
                timeout,
            ),
            competitors: CompetitorDetector::new(
                sources.places,
                cache.clone(),
                ttl,
                resolution,
                config.search.competitor_keywords.clone(),
                config.search.places_calls_per_second,
                timeout,
            ),
            density: DensityEvaluator::new(
                sources.density,
                cache.clone(),
                ttl,
                resolution,
                config.thresholds.density_threshold,
                timeout,
            ),
            generator: CandidateGenerator::new(
                config.search.spacing_m,
                config.search.max_candidates,
            ),
            geocoder: sources.geocoder,
            scoring,
            cache,
            config,
        })
    }

    /// Rank candidate locations for a city name or postal code.
    ///
    /// Returns the full batch ordered best-first; degraded candidates stay
    /// in, annotated. An unresolvable target yields an empty ranking, not an
    /// error.
    pub async fn rank(&self, target: &str) -> Result<Vec<ScoredCandidate>, EngineError> {
        let Some(area) = self.resolve_area(target).await else {
            warn!("could not resolve target area {:?}", target);
            return Ok(Vec::new());
        };

        let mut candidates: Vec<CandidateLocation> = self.generator.grid(&area).collect();
        if self.config.search.seed_residential {
            let seeds = self.residential_seeds(&area, &candidates).await;
            info!("seeded {} high-density residential candidates", seeds.len());
            candidates.extend(seeds);
        }
        info!(
            "ranking {} candidates around {} (r={:.0}m)",
            candidates.len(),
            area.center,
            area.radius_m
        );

        let mut evaluated: Vec<(usize, CandidateSignals)> =
            stream::iter(candidates.into_iter().enumerate())
                .map(|(idx, candidate)| async move {
                    (idx, self.collect_signals(candidate).await)
                })
                .buffer_unordered(self.config.search.max_in_flight)
                .collect()
                .await;

        // Restore insertion order so tie-breaks are deterministic no matter
        // which evaluations finished first
        evaluated.sort_by_key(|(idx, _)| *idx);

        let ranked = self
            .scoring
            .rank(evaluated.into_iter().map(|(_, signals)| signals).collect());

        info!(
            "ranked {} candidates for {:?}, best score {:.3}",
            ranked.len(),
            target,
            ranked.first().map(|c| c.score).unwrap_or(0.0)
        );
        Ok(ranked)
    }

    /// Gather the three signals for one candidate. Never fails; failures
    /// surface as unavailable/None signals.
    async fn collect_signals(&self, mut candidate: CandidateLocation) -> CandidateSignals {
        let area = self
            .estimator
            .estimate(candidate.point, self.config.walking.time_budget_min)
            .await;

        let (population, competitors, density) = tokio::join!(
            self.population.population_within(&area),
            self.competitors.competitors_within(&area),
            self.density.evaluate(candidate.point),
        );

        let competitors = match competitors {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("competitor lookup failed at {}: {}", candidate.point, e);
                None
            }
        };

        if self.config.search.resolve_addresses && candidate.address.is_none() {
            candidate.address = self.reverse_geocode(candidate.point).await;
        }

        CandidateSignals {
            candidate,
            population,
            competitors,
            density,
        }
    }

    /// Extra candidates at high-density residential spots, found by probing
    /// density on a coarse grid over the area. Densest first; probes close to
    /// an existing grid candidate are skipped.
    async fn residential_seeds(
        &self,
        area: &ResolvedArea,
        existing: &[CandidateLocation],
    ) -> Vec<CandidateLocation> {
        let floor = self.config.search.residential_seed_floor;
        let min_gap_m = self.config.search.spacing_m / 2.0;

        let probes: Vec<GeoPoint> = self
            .generator
            .probe_grid(area, RESIDENTIAL_PROBE_RESOLUTION)
            .collect();

        let sampled: Vec<(GeoPoint, crate::models::DensityScore)> = stream::iter(probes)
            .map(|p| async move { (p, self.density.evaluate(p).await) })
            .buffer_unordered(self.config.search.max_in_flight)
            .collect()
            .await;

        let mut dense: Vec<(GeoPoint, f64)> = sampled
            .into_iter()
            .filter(|(_, score)| !score.provenance.is_unavailable() && score.value >= floor)
            .map(|(p, score)| (p, score.value))
            .collect();
        dense.sort_by(|a, b| b.1.total_cmp(&a.1));

        dense
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| existing.iter().all(|c| c.point.distance_m(*p) > min_gap_m))
            .map(CandidateLocation::new)
            .collect()
    }

    async fn resolve_area(&self, target: &str) -> Option<ResolvedArea> {
        let key = CacheKey::for_query("geocode", target);
        if let Some(area) = self.cache.get::<ResolvedArea>(&key).await {
            return Some(area);
        }

        match self.geocoder.resolve_area(target).await {
            Ok(area) => {
                self.cache.put(&key, &area, self.config.cache.ttl()).await;
                Some(area)
            }
            Err(e) => {
                warn!("geocoding {:?} failed: {}", target, e);
                None
            }
        }
    }

    /// Best-effort candidate address; any failure is just `None`.
    async fn reverse_geocode(&self, point: GeoPoint) -> Option<String> {
        let key = CacheKey::for_cell(
            "revgeo",
            point,
            self.config.cache.cell_resolution_deg,
            "",
        );
        if let Some(address) = self.cache.get::<Option<String>>(&key).await {
            return address;
        }

        match self.geocoder.reverse(point).await {
            Ok(address) => {
                self.cache
                    .put(&key, &address, self.config.cache.ttl())
                    .await;
                address
            }
            Err(e) => {
                warn!("reverse geocoding {} failed: {}", point, e);
                None
            }
        }
    }
}
