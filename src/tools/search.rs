//! Attraction search
//!
//! The live provider is OpenTripMap (radius search around the geocoded
//! destination centre). `MockAttractionSearch` serves a fixed catalogue and
//! keeps the system usable offline and in tests.

use crate::error::ToolError;
use crate::models::{Attraction, Coordinates};
use crate::tools::cost::normalize_destination;
use crate::tools::geocode::Geocoder;
use crate::tools::{bounded, ToolResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const OPENTRIPMAP_RADIUS_URL: &str = "https://api.opentripmap.com/0.1/en/places/radius";

/// Trait for an attraction search provider
#[async_trait::async_trait]
pub trait AttractionSearch: Send + Sync {
    fn name(&self) -> &'static str;

    /// Find attractions in `destination` matching any of `interests`.
    async fn search(
        &self,
        destination: &str,
        interests: &[String],
        limit: usize,
    ) -> ToolResult<Vec<Attraction>>;
}

/// Search with a deadline; at most `limit` results in provider order.
pub async fn search_attractions(
    source: &dyn AttractionSearch,
    destination: &str,
    interests: &[String],
    limit: usize,
    timeout: Duration,
) -> ToolResult<Vec<Attraction>> {
    let mut attractions = bounded(
        timeout,
        source.name(),
        source.search(destination, interests, limit),
    )
    .await?;

    attractions.truncate(limit);
    Ok(attractions)
}

/// Map an interest tag onto OpenTripMap `kinds`
pub fn kinds_for_interest(interest: &str) -> &'static str {
    match interest {
        "museums" | "museum" => "museums",
        "art" | "galleries" => "museums,theatres_and_entertainments",
        "food" | "cuisine" | "restaurants" => "foods",
        "landmarks" | "sightseeing" => "architecture,monuments_and_memorials",
        "history" | "historic" => "historic",
        "culture" | "cultural" => "cultural",
        "architecture" => "architecture",
        "nature" | "outdoors" => "natural",
        "parks" | "gardens" => "gardens_and_parks",
        "beaches" | "beach" => "beaches",
        "nightlife" | "entertainment" => "amusements",
        "shopping" => "shops",
        "religion" | "churches" => "religion",
        "sports" => "sport",
        _ => "interesting_places",
    }
}

//
// ================= OpenTripMap =================
//

pub struct OpenTripMapSearch {
    client: Client,
    api_key: String,
    radius_km: u32,
    geocoder: Arc<dyn Geocoder>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OtmPlace {
    xid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    rate: Value,
    #[serde(default)]
    kinds: String,
    #[serde(default)]
    dist: Option<f64>,
    #[serde(default)]
    wikidata: Option<String>,
    point: Option<OtmPoint>,
}

#[derive(Debug, Deserialize)]
struct OtmPoint {
    lon: f64,
    lat: f64,
}

impl OpenTripMapSearch {
    pub fn new(
        api_key: String,
        radius_km: u32,
        geocoder: Arc<dyn Geocoder>,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_key,
            radius_km,
            geocoder,
            base_url: OPENTRIPMAP_RADIUS_URL.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl AttractionSearch for OpenTripMapSearch {
    fn name(&self) -> &'static str {
        "opentripmap"
    }

    async fn search(
        &self,
        destination: &str,
        interests: &[String],
        limit: usize,
    ) -> ToolResult<Vec<Attraction>> {
        if self.api_key.is_empty() {
            return Err(ToolError::LookupUnavailable(
                "OPENTRIPMAP_API_KEY is not configured".to_string(),
            ));
        }

        let centre = self.geocoder.geocode(destination).await?;

        let mut kinds: Vec<&str> = interests.iter().map(|i| kinds_for_interest(i)).collect();
        kinds.sort_unstable();
        kinds.dedup();
        let kinds = kinds.join(",");

        debug!(destination = %destination, kinds = %kinds, "Querying OpenTripMap");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("radius", (self.radius_km * 1000).to_string()),
                ("lon", centre.lon.to_string()),
                ("lat", centre.lat.to_string()),
                ("kinds", kinds),
                ("format", "json".to_string()),
                ("limit", limit.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "OpenTripMap API error");
            return Err(ToolError::LookupUnavailable(format!(
                "OpenTripMap returned {}",
                response.status()
            )));
        }

        let places: Vec<OtmPlace> = response.json().await?;
        let attractions: Vec<Attraction> = places
            .into_iter()
            .filter_map(|place| place_to_attraction(place, interests))
            .collect();

        info!(
            destination = %destination,
            count = attractions.len(),
            "OpenTripMap search completed"
        );

        Ok(attractions)
    }
}

fn place_to_attraction(place: OtmPlace, interests: &[String]) -> Option<Attraction> {
    let name = place.name.trim();
    if name.is_empty() {
        return None;
    }

    let place_kinds: Vec<&str> = place.kinds.split(',').map(str::trim).collect();
    let category = interests
        .iter()
        .find(|interest| {
            kinds_for_interest(interest)
                .split(',')
                .any(|k| place_kinds.contains(&k))
        })
        .or_else(|| interests.first())
        .cloned()
        .unwrap_or_else(|| "interesting_places".to_string());

    let mut metadata = BTreeMap::new();
    metadata.insert("provider".to_string(), "opentripmap".to_string());
    metadata.insert("kinds".to_string(), place.kinds.clone());
    if let Some(dist) = place.dist {
        metadata.insert("distance_from_centre_m".to_string(), format!("{:.0}", dist));
    }
    if let Some(wikidata) = place.wikidata {
        metadata.insert("wikidata".to_string(), wikidata);
    }

    Some(Attraction {
        id: place.xid,
        name: name.to_string(),
        category,
        coordinates: place.point.map(|p| Coordinates::new(p.lat, p.lon)),
        rating: parse_rate(&place.rate),
        metadata,
    })
}

/// OpenTripMap rates come as numbers or strings like "3h"
fn parse_rate(rate: &Value) -> f64 {
    match rate {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim_end_matches(|c: char| !c.is_ascii_digit())
            .parse()
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

//
// ================= Mock =================
//

/// Mock search provider for development & testing
///
/// Serves a fixed catalogue filtered by category. Can be told to fail for
/// some categories, fail entirely, or answer slowly.
pub struct MockAttractionSearch {
    catalogue: Vec<Attraction>,
    destination: Option<String>,
    failing_categories: Vec<String>,
    unavailable: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockAttractionSearch {
    pub fn new(catalogue: Vec<Attraction>) -> Self {
        Self {
            catalogue,
            destination: None,
            failing_categories: Vec::new(),
            unavailable: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that fails every lookup
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(Vec::new())
        }
    }

    /// Serve the catalogue only for this destination; others get no results
    pub fn only_for(mut self, destination: &str) -> Self {
        self.destination = Some(normalize_destination(destination));
        self
    }

    pub fn failing_for(mut self, category: &str) -> Self {
        self.failing_categories.push(category.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AttractionSearch for MockAttractionSearch {
    fn name(&self) -> &'static str {
        "mock_search"
    }

    async fn search(
        &self,
        destination: &str,
        interests: &[String],
        limit: usize,
    ) -> ToolResult<Vec<Attraction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable {
            return Err(ToolError::LookupUnavailable("mock provider offline".to_string()));
        }

        if let Some(failing) = interests
            .iter()
            .find(|i| self.failing_categories.contains(i))
        {
            return Err(ToolError::LookupUnavailable(format!(
                "mock provider failed for {}",
                failing
            )));
        }

        if let Some(only) = &self.destination {
            if *only != normalize_destination(destination) {
                return Ok(Vec::new());
            }
        }

        Ok(self
            .catalogue
            .iter()
            .filter(|a| interests.contains(&a.category))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Small Paris catalogue used by the offline mode and tests
pub fn paris_catalogue() -> Vec<Attraction> {
    let entry = |id: &str, name: &str, category: &str, (lat, lon): (f64, f64), rating: f64, about: &str| {
        let mut metadata = BTreeMap::new();
        metadata.insert("provider".to_string(), "mock".to_string());
        metadata.insert("description".to_string(), about.to_string());
        Attraction {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            coordinates: Some(Coordinates::new(lat, lon)),
            rating,
            metadata,
        }
    };

    vec![
        entry("louvre", "Louvre Museum", "museums", (48.8606, 2.3376), 4.8,
            "The world's most visited art museum, home of the Mona Lisa."),
        entry("orsay", "Musée d'Orsay", "museums", (48.8600, 2.3266), 4.7,
            "Impressionist masterpieces inside a former railway station."),
        entry("rodin", "Musée Rodin", "museums", (48.8553, 2.3159), 4.5,
            "Rodin's sculptures in a mansion with a rose garden."),
        entry("pompidou", "Centre Pompidou", "museums", (48.8607, 2.3522), 4.4,
            "Modern and contemporary art behind an inside-out facade."),
        entry("orangerie", "Musée de l'Orangerie", "museums", (48.8638, 2.3226), 4.6,
            "Monet's Water Lilies in two oval rooms."),
        entry("eiffel", "Eiffel Tower", "landmarks", (48.8584, 2.2945), 4.7,
            "Iron lattice tower with city views from three levels."),
        entry("arc", "Arc de Triomphe", "landmarks", (48.8738, 2.2950), 4.6,
            "Triumphal arch at the top of the Champs-Élysées."),
        entry("sacre-coeur", "Sacré-Cœur", "landmarks", (48.8867, 2.3431), 4.6,
            "White-domed basilica on the Montmartre hilltop."),
        entry("enfants-rouges", "Marché des Enfants Rouges", "food", (48.8629, 2.3617), 4.4,
            "The oldest covered market in Paris, with food stalls for lunch."),
        entry("rue-cler", "Rue Cler Market Street", "food", (48.8563, 2.3066), 4.3,
            "Pedestrian street of bakeries, cheese shops and cafés."),
        entry("bourse", "Bourse de Commerce Food Hall", "food", (48.8628, 2.3429), 4.1,
            "Food hall next to the restored commodities exchange."),
        entry("luxembourg", "Jardin du Luxembourg", "parks", (48.8462, 2.3372), 4.7,
            "Formal gardens around the Luxembourg Palace."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interests(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_kinds_mapping() {
        assert_eq!(kinds_for_interest("food"), "foods");
        assert_eq!(kinds_for_interest("museums"), "museums");
        assert_eq!(kinds_for_interest("something else"), "interesting_places");
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(&serde_json::json!(7)), 7.0);
        assert_eq!(parse_rate(&serde_json::json!("3h")), 3.0);
        assert_eq!(parse_rate(&serde_json::json!(null)), 0.0);
    }

    #[test]
    fn test_place_to_attraction_picks_matching_interest() {
        let place: OtmPlace = serde_json::from_value(serde_json::json!({
            "xid": "N123",
            "name": "Musée Test",
            "rate": 3,
            "kinds": "cultural,museums,interesting_places",
            "dist": 512.4,
            "point": {"lon": 2.33, "lat": 48.86}
        }))
        .unwrap();

        let attraction = place_to_attraction(place, &interests(&["food", "museums"])).unwrap();
        assert_eq!(attraction.id, "N123");
        assert_eq!(attraction.category, "museums");
        assert_eq!(attraction.rating, 3.0);
        assert_eq!(attraction.coordinates, Some(Coordinates::new(48.86, 2.33)));
        assert_eq!(attraction.metadata["distance_from_centre_m"], "512");
    }

    #[test]
    fn test_unnamed_place_is_skipped() {
        let place: OtmPlace = serde_json::from_value(serde_json::json!({
            "xid": "N1", "name": "  ", "kinds": "museums"
        }))
        .unwrap();
        assert!(place_to_attraction(place, &interests(&["museums"])).is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_lookup_unavailable() {
        struct NeverGeocoder;

        #[async_trait::async_trait]
        impl Geocoder for NeverGeocoder {
            async fn geocode(&self, _place: &str) -> ToolResult<Coordinates> {
                panic!("geocoder must not be called without an API key");
            }
        }

        let search = OpenTripMapSearch::new(String::new(), 10, Arc::new(NeverGeocoder)).unwrap();
        let result = search.search("Paris", &interests(&["museums"]), 5).await;
        assert!(matches!(result, Err(ToolError::LookupUnavailable(_))));
    }

    #[tokio::test]
    async fn test_mock_filters_and_limits() {
        let search = MockAttractionSearch::new(paris_catalogue());
        let found = search_attractions(
            &search,
            "Paris",
            &interests(&["museums"]),
            3,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|a| a.category == "museums"));
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let search = MockAttractionSearch::new(paris_catalogue()).with_delay(Duration::from_secs(5));
        let result = search_attractions(
            &search,
            "Paris",
            &interests(&["food"]),
            5,
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(ToolError::LookupUnavailable(_))));
    }

    #[tokio::test]
    async fn test_destination_filter() {
        let search = MockAttractionSearch::new(paris_catalogue()).only_for("Paris");
        assert_eq!(search.search("Paris, France", &interests(&["food"]), 10).await.unwrap().len(), 3);
        assert!(search.search("Tokyo", &interests(&["food"]), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_category() {
        let search = MockAttractionSearch::new(paris_catalogue()).failing_for("food");
        assert!(search.search("Paris", &interests(&["food"]), 5).await.is_err());
        assert!(search.search("Paris", &interests(&["museums"]), 5).await.is_ok());
    }
}
