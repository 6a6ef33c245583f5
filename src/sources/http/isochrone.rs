//! Pedestrian isochrone adapter (GeoJSON polygon responses).

use async_trait::async_trait;
use geo::{Coord, LineString, Polygon};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::error::SourceError;
use crate::models::GeoPoint;
use crate::sources::IsochroneProvider;

pub struct HttpIsochroneProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IsochroneResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: FeatureGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    /// GeoJSON polygon rings: outer ring first, [lon, lat] pairs.
    coordinates: Vec<Vec<[f64; 2]>>,
}

impl HttpIsochroneProvider {
    pub fn new(base_url: Url, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: super::build_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl IsochroneProvider for HttpIsochroneProvider {
    async fn isochrone(
        &self,
        origin: GeoPoint,
        minutes: f64,
        speed_kmh: f64,
    ) -> Result<Polygon<f64>, SourceError> {
        let url = self
            .base_url
            .join("isochrones/foot-walking")
            .map_err(|e| SourceError::unavailable(format!("bad isochrone URL: {}", e)))?;

        let body = json!({
            "locations": [[origin.lon, origin.lat]],
            "range": [minutes * 60.0],
            "range_type": "time",
            "options": { "walking_speed_kmh": speed_kmh },
        });

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::unavailable(format!("isochrone request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "isochrone returned HTTP {}",
                response.status()
            )));
        }

        let data: IsochroneResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed isochrone response: {}", e)))?;

        let feature = data
            .features
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable("isochrone response had no features"))?;

        let outer = feature
            .geometry
            .coordinates
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable("isochrone polygon had no rings"))?;

        if outer.len() < 4 {
            return Err(SourceError::unavailable("degenerate isochrone ring"));
        }

        let ring: Vec<Coord<f64>> = outer.into_iter().map(|[x, y]| Coord { x, y }).collect();
        Ok(Polygon::new(LineString::new(ring), vec![]))
    }
}
