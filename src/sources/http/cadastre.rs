//! Residential density adapter (cadastral/statistical point lookup).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::SourceError;
use crate::models::GeoPoint;
use crate::sources::DensitySource;

pub struct HttpDensitySource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DensityResponse {
    /// Units or inhabitants per km² at the queried point.
    density_per_km2: f64,
}

impl HttpDensitySource {
    pub fn new(base_url: Url, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: super::build_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl DensitySource for HttpDensitySource {
    async fn density_at(&self, point: GeoPoint) -> Result<f64, SourceError> {
        let url = self
            .base_url
            .join("density")
            .map_err(|e| SourceError::unavailable(format!("bad density URL: {}", e)))?;

        let mut request = self
            .client
            .get(url)
            .query(&[("lat", point.lat), ("lon", point.lon)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::unavailable(format!("density request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "density returned HTTP {}",
                response.status()
            )));
        }

        let data: DensityResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed density response: {}", e)))?;

        Ok(data.density_per_km2.max(0.0))
    }
}
