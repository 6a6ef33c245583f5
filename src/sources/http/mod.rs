//! Network-backed source adapters.

mod cadastre;
mod census;
mod geocode;
mod isochrone;
mod places;

pub use cadastre::HttpDensitySource;
pub use census::HttpPopulationSource;
pub use geocode::HttpGeocoder;
pub use isochrone::HttpIsochroneProvider;
pub use places::HttpPlacesSource;

use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client with the settings every adapter wants.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("siterank/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .expect("failed to build HTTP client")
}
