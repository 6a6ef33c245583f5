//! Population-grid adapter.
//!
//! Speaks a small JSON protocol: a bbox query returns grid cells as
//! rectangles with a total headcount each.

use async_trait::async_trait;
use geo::{Coord, Rect};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::SourceError;
use crate::sources::{PopulationCell, PopulationSource};

pub struct HttpPopulationSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CellsResponse {
    #[serde(default)]
    cells: Vec<CellRecord>,
}

#[derive(Debug, Deserialize)]
struct CellRecord {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    population: f64,
}

impl HttpPopulationSource {
    pub fn new(base_url: Url, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: super::build_client(timeout),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl PopulationSource for HttpPopulationSource {
    async fn fetch_cells(&self, bbox: Rect<f64>) -> Result<Vec<PopulationCell>, SourceError> {
        let url = self
            .base_url
            .join("cells")
            .map_err(|e| SourceError::unavailable(format!("bad census URL: {}", e)))?;

        let mut request = self.client.get(url).query(&[
            ("min_lon", bbox.min().x),
            ("min_lat", bbox.min().y),
            ("max_lon", bbox.max().x),
            ("max_lat", bbox.max().y),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::unavailable(format!("census request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::unavailable(format!(
                "census returned HTTP {}",
                response.status()
            )));
        }

        let data: CellsResponse = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(format!("malformed census response: {}", e)))?;

        debug!("census bbox query returned {} cells", data.cells.len());

        Ok(data
            .cells
            .into_iter()
            .map(|c| PopulationCell {
                geometry: Rect::new(
                    Coord {
                        x: c.min_lon,
                        y: c.min_lat,
                    },
                    Coord {
                        x: c.max_lon,
                        y: c.max_lat,
                    },
                )
                .to_polygon(),
                population: c.population.max(0.0),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "census-grid"
    }
}
