//! Geocoding provider (Nominatim)
//!
//! Resolves a destination name to the coordinates of its centre. Results
//! are memoized for the process lifetime; a city does not move.

use crate::error::ToolError;
use crate::models::Coordinates;
use crate::tools::ToolResult;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = "trip_planner_orchestrator";

/// Trait for resolving place names to coordinates
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> ToolResult<Coordinates>;
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    cache: Arc<RwLock<HashMap<String, Coordinates>>>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new() -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: NOMINATIM_URL.to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> ToolResult<Coordinates> {
        let key = place.trim().to_lowercase();

        {
            let cache = self.cache.read().await;
            if let Some(coords) = cache.get(&key) {
                return Ok(*coords);
            }
        }

        debug!(place = %place, "Geocoding place");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), place = %place, "Geocoder returned error status");
            return Err(ToolError::LookupUnavailable(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        let first = places.first().ok_or_else(|| {
            ToolError::LookupUnavailable(format!("place '{}' not found", place))
        })?;

        let coords = parse_coordinates(&first.lat, &first.lon)?;

        let mut cache = self.cache.write().await;
        cache.insert(key, coords);

        Ok(coords)
    }
}

fn parse_coordinates(lat: &str, lon: &str) -> ToolResult<Coordinates> {
    let parsed = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>());
    match parsed {
        (Ok(lat), Ok(lon)) if Coordinates::new(lat, lon).is_valid() => {
            Ok(Coordinates::new(lat, lon))
        }
        (Ok(lat), Ok(lon)) => Err(ToolError::InvalidCoordinate { lat, lon }),
        _ => Err(ToolError::LookupUnavailable(format!(
            "unparseable coordinates: {}, {}",
            lat, lon
        ))),
    }
}
