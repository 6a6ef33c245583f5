//! Siterank - multi-criteria geospatial scoring for retail site selection
//!
//! Ranks candidate addresses by combining three signals: pedestrian-reachable
//! population, absence of nearby competitors, and residential density.
//! External data sources are injected behind traits; all lookups go through a
//! TTL cache keyed by geographic cell. The single consumer-facing operation
//! is [`SiteRanker::rank`].

pub mod cache;
pub mod candidates;
pub mod competitors;
pub mod config;
pub mod density;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod models;
pub mod population;
pub mod reach;
pub mod scoring;
pub mod sources;

pub use config::RankConfig;
pub use engine::{SiteRanker, Sources};
pub use error::{EngineError, SourceError};
pub use models::{
    CandidateLocation, CompetitorRecord, DensityScore, GeoPoint, PopulationFigure, Provenance,
    ReachabilityArea, ScoredCandidate,
};
pub use scoring::ScoringWeights;
