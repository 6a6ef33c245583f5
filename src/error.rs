//! Error taxonomy for the scoring engine.
//!
//! Only configuration problems surface as hard failures. Data-source trouble
//! is recovered per component and shows up as provenance annotations on the
//! affected candidate, never as an aborted batch.

use std::time::Duration;
use thiserror::Error;

/// Fatal errors, raised before any evaluation work begins.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid weights or thresholds.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Per-call failures from an external data source.
///
/// These are always handled locally by the component that issued the call
/// (degrade to zero/unknown/approximate) and never propagate out of `rank`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        SourceError::Unavailable(msg.into())
    }
}
