//! Geocoding adapter (Google Geocoding API wire format).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::error::SourceError;
use crate::models::GeoPoint;
use crate::sources::{Geocoder, ResolvedArea};

pub struct HttpGeocoder {
    client: Client,
    base_url: Url,
    api_key: String,
    /// Search radius used when the provider returns no viewport.
    default_radius_m: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    viewport: Option<Viewport>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Viewport {
    northeast: LatLng,
    southwest: LatLng,
}

impl HttpGeocoder {
    pub fn new(base_url: Url, api_key: String, timeout: Duration, default_radius_m: f64) -> Self {
        Self {
            client: super::build_client(timeout),
            base_url,
            api_key,
            default_radius_m,
        }
    }

    async fn geocode(&self, params: &[(&str, String)]) -> Result<GeocodeResponse, SourceError> {
        let url = self
            .base_url
            .join("geocode/json")
            .map_err(|e| SourceError::unavailable(format!("bad geocode URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str()), ("language", "fr")])
            .send()
            .await
            .map_err(|e| SourceError::unavailable(format!("geocode request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "geocode returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<GeocodeResponse>()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed geocode response: {}", e)))
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve_area(&self, query: &str) -> Result<ResolvedArea, SourceError> {
        let data = self.geocode(&[("address", query.to_string())]).await?;

        if data.status != "OK" {
            return Err(SourceError::unavailable(format!(
                "geocode status {} for {:?}",
                data.status, query
            )));
        }

        let result = data
            .results
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable(format!("no geocode result for {:?}", query)))?;

        let center = GeoPoint::new(result.geometry.location.lat, result.geometry.location.lng);

        // Half the viewport diagonal is a decent search radius for a city
        let radius_m = match result.geometry.viewport {
            Some(vp) => {
                let ne = GeoPoint::new(vp.northeast.lat, vp.northeast.lng);
                let sw = GeoPoint::new(vp.southwest.lat, vp.southwest.lng);
                (ne.distance_m(sw) / 2.0).max(500.0)
            }
            None => self.default_radius_m,
        };

        Ok(ResolvedArea {
            center,
            radius_m,
            label: result.formatted_address,
        })
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>, SourceError> {
        let latlng = format!("{},{}", point.lat, point.lon);
        let data = self.geocode(&[("latlng", latlng)]).await?;

        match data.status.as_str() {
            "OK" => Ok(data.results.into_iter().next().map(|r| r.formatted_address)),
            "ZERO_RESULTS" => Ok(None),
            other => {
                warn!("reverse geocode status {} at {}", other, point);
                Ok(None)
            }
        }
    }
}
