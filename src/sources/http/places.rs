//! Places adapter (nearby-search wire format).
//!
//! Call pacing lives in the competitor detector, which budgets whatever
//! places source it is given.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::SourceError;
use crate::models::GeoPoint;
use crate::sources::{PlaceHit, PlacesSource};

pub struct HttpPlacesSource {
    client: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    name: String,
    geometry: NearbyGeometry,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl HttpPlacesSource {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Self {
        Self {
            client: super::build_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl PlacesSource for HttpPlacesSource {
    async fn search(
        &self,
        center: GeoPoint,
        radius_m: f64,
        keywords: &[String],
    ) -> Result<Vec<PlaceHit>, SourceError> {
        let url = self
            .base_url
            .join("place/nearbysearch/json")
            .map_err(|e| SourceError::unavailable(format!("bad places URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .query(&[
                ("location", format!("{},{}", center.lat, center.lon)),
                ("radius", format!("{:.0}", radius_m)),
                ("keyword", keywords.join("|")),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::unavailable(format!("places request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "places returned HTTP {}",
                response.status()
            )));
        }

        let data: NearbyResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed places response: {}", e)))?;

        match data.status.as_str() {
            // ZERO_RESULTS is a real answer, not a failure
            "OK" | "ZERO_RESULTS" => {}
            other => {
                return Err(SourceError::unavailable(format!(
                    "places status {}",
                    other
                )))
            }
        }

        debug!(
            "places query at {} r={:.0}m: {} hits",
            center,
            radius_m,
            data.results.len()
        );

        Ok(data
            .results
            .into_iter()
            .map(|r| PlaceHit {
                name: r.name,
                location: GeoPoint::new(r.geometry.location.lat, r.geometry.location.lng),
                category: r.types.into_iter().next().unwrap_or_default(),
            })
            .collect())
    }
}
