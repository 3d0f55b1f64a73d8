//! Researcher role
//!
//! One search per requested interest, results merged by attraction identity
//! and ranked by rating then relevance. When every lookup fails the role
//! returns an empty list with the degraded flag set instead of aborting.

use crate::agents::{narrate, Narration};
use crate::config::WorkflowConfig;
use crate::gemini::TextGenerator;
use crate::models::Attraction;
use crate::state::TripState;
use crate::tools::{search_attractions, AttractionSearch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a travel researcher. Summarize the most \
interesting attractions of a destination in two or three sentences, \
mentioning why they suit the traveller's interests.";

/// Output of the researcher role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchFragment {
    /// Ranked, de-duplicated, capped
    pub attractions: Vec<Attraction>,
    pub failed_interests: Vec<String>,
    /// Set when the search failed for every interest
    pub degraded: bool,
    pub narration: Narration,
}

pub struct ResearcherAgent {
    search: Arc<dyn AttractionSearch>,
    generator: Arc<dyn TextGenerator>,
}

impl ResearcherAgent {
    pub fn new(search: Arc<dyn AttractionSearch>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { search, generator }
    }

    pub async fn run(&self, state: &TripState, config: &WorkflowConfig) -> ResearchFragment {
        let request = state.request();
        let mut found: Vec<(usize, Vec<Attraction>)> = Vec::new();
        let mut failed_interests = Vec::new();

        for (index, interest) in request.interests.iter().enumerate() {
            let result = search_attractions(
                self.search.as_ref(),
                &request.destination,
                std::slice::from_ref(interest),
                config.max_attractions,
                config.tool_timeout,
            )
            .await;

            match result {
                Ok(attractions) => found.push((index, attractions)),
                Err(e) => {
                    warn!(
                        destination = %request.destination,
                        interest = %interest,
                        error = %e,
                        "Attraction search failed, continuing without this interest"
                    );
                    failed_interests.push(interest.clone());
                }
            }
        }

        let degraded = !request.interests.is_empty() && found.is_empty();
        let attractions = rank_attractions(found, config.max_attractions);

        info!(
            destination = %request.destination,
            attractions = attractions.len(),
            failed = failed_interests.len(),
            degraded,
            "Research completed"
        );

        let prompt = research_prompt(state, &attractions);
        let narration = narrate(
            self.generator.as_ref(),
            SYSTEM_PROMPT,
            &prompt,
            config.generation_timeout,
            || research_template(state, &attractions, &failed_interests),
        )
        .await;

        ResearchFragment {
            attractions,
            failed_interests,
            degraded,
            narration,
        }
    }
}

struct Candidate {
    attraction: Attraction,
    matches: usize,
    first_interest: usize,
}

fn identity(attraction: &Attraction) -> String {
    let id = attraction.id.trim();
    if id.is_empty() {
        let name = attraction
            .name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        format!("name:{}", name)
    } else {
        format!("id:{}", id)
    }
}

/// Merge per-interest results and rank them.
///
/// Order: rating (desc), number of interests that surfaced the attraction
/// (desc), earliest requested interest, then name.
pub fn rank_attractions(found: Vec<(usize, Vec<Attraction>)>, max: usize) -> Vec<Attraction> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();

    for (interest_index, attractions) in found {
        for attraction in attractions {
            let key = identity(&attraction);
            match by_identity.get(&key) {
                Some(&pos) => {
                    let candidate = &mut candidates[pos];
                    candidate.matches += 1;
                    candidate.first_interest = candidate.first_interest.min(interest_index);
                }
                None => {
                    by_identity.insert(key, candidates.len());
                    candidates.push(Candidate {
                        attraction,
                        matches: 1,
                        first_interest: interest_index,
                    });
                }
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.attraction
            .rating
            .total_cmp(&a.attraction.rating)
            .then_with(|| b.matches.cmp(&a.matches))
            .then_with(|| a.first_interest.cmp(&b.first_interest))
            .then_with(|| a.attraction.name.cmp(&b.attraction.name))
    });

    candidates
        .into_iter()
        .take(max)
        .map(|c| c.attraction)
        .collect()
}

fn research_prompt(state: &TripState, attractions: &[Attraction]) -> String {
    let request = state.request();
    let mut prompt = format!(
        "Summarize the highlights of {} for a traveller interested in {}.\nAttractions:\n",
        request.destination,
        request.interests.join(", ")
    );
    for attraction in attractions {
        prompt.push_str(&format!(
            "- {} ({}, rated {:.1})\n",
            attraction.name, attraction.category, attraction.rating
        ));
    }
    prompt
}

fn research_template(
    state: &TripState,
    attractions: &[Attraction],
    failed_interests: &[String],
) -> String {
    let request = state.request();

    if attractions.is_empty() {
        return format!(
            "No attraction data was available for {}. The plan below relies on cost data \
             and general suggestions.",
            request.destination
        );
    }

    let top: Vec<&str> = attractions.iter().take(3).map(|a| a.name.as_str()).collect();
    let mut text = format!(
        "Found {} attractions in {} matching {}. Top picks: {}.",
        attractions.len(),
        request.destination,
        request.interests.join(", "),
        top.join(", ")
    );

    if !failed_interests.is_empty() {
        text.push_str(&format!(
            " Lookups were unavailable for: {}.",
            failed_interests.join(", ")
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockGenerator;
    use crate::models::{TravelStyle, TripRequest};
    use crate::tools::{paris_catalogue, MockAttractionSearch};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn state(interests: &[&str]) -> TripState {
        TripState::new(TripRequest {
            destination: "Paris".to_string(),
            num_days: 4,
            budget_usd: 2500.0,
            travel_style: TravelStyle::MidRange,
            interests: interests.iter().map(|i| i.to_string()).collect(),
        })
    }

    fn attraction(id: &str, name: &str, category: &str, rating: f64) -> Attraction {
        Attraction {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            coordinates: None,
            rating,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_rank_dedupes_and_orders() {
        let found = vec![
            (
                0,
                vec![
                    attraction("a", "Alpha", "museums", 4.0),
                    attraction("b", "Beta", "museums", 4.5),
                ],
            ),
            (
                1,
                vec![
                    attraction("a", "Alpha", "history", 4.0),
                    attraction("c", "Gamma", "history", 4.0),
                    attraction("", "  Delta  Hall ", "history", 3.0),
                    attraction("", "delta hall", "history", 3.0),
                ],
            ),
        ];

        let ranked = rank_attractions(found, 10);
        let ids: Vec<&str> = ranked.iter().map(|a| a.name.as_str()).collect();

        // Alpha beats Gamma on relevance (surfaced by two interests)
        assert_eq!(ids, vec!["Beta", "Alpha", "Gamma", "  Delta  Hall "]);
        assert_eq!(ranked[1].category, "museums");
    }

    #[test]
    fn test_rank_caps_results() {
        let found = vec![(
            0,
            (0..20)
                .map(|i| attraction(&i.to_string(), &format!("Place {}", i), "food", 3.0))
                .collect(),
        )];
        assert_eq!(rank_attractions(found, 5).len(), 5);
    }

    #[tokio::test]
    async fn test_research_happy_path() {
        let search = Arc::new(MockAttractionSearch::new(paris_catalogue()));
        let agent = ResearcherAgent::new(search.clone(), Arc::new(MockGenerator::new()));

        let fragment = agent
            .run(&state(&["museums", "food"]), &WorkflowConfig::default())
            .await;

        assert!(!fragment.degraded);
        assert_eq!(fragment.attractions.len(), 8);
        assert_eq!(fragment.attractions[0].name, "Louvre Museum");
        assert_eq!(search.calls(), 2);
        assert!(!fragment.narration.fallback_used);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_degraded() {
        let search = Arc::new(MockAttractionSearch::new(paris_catalogue()).failing_for("food"));
        let agent = ResearcherAgent::new(search, Arc::new(MockGenerator::failing()));

        let fragment = agent
            .run(&state(&["museums", "food"]), &WorkflowConfig::default())
            .await;

        assert!(!fragment.degraded);
        assert_eq!(fragment.failed_interests, vec!["food"]);
        assert!(fragment.attractions.iter().all(|a| a.category == "museums"));
        assert!(fragment.narration.fallback_used);
        assert!(fragment.narration.text.contains("unavailable for: food"));
    }

    #[tokio::test]
    async fn test_total_failure_is_degraded() {
        let agent = ResearcherAgent::new(
            Arc::new(MockAttractionSearch::unavailable()),
            Arc::new(MockGenerator::new()),
        );

        let fragment = agent
            .run(&state(&["museums", "food"]), &WorkflowConfig::default())
            .await;

        assert!(fragment.degraded);
        assert!(fragment.attractions.is_empty());
        assert_eq!(fragment.failed_interests.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_search_times_out_into_degraded() {
        let search = MockAttractionSearch::new(paris_catalogue()).with_delay(Duration::from_secs(5));
        let agent = ResearcherAgent::new(Arc::new(search), Arc::new(MockGenerator::new()));
        let config = WorkflowConfig {
            tool_timeout: Duration::from_millis(20),
            ..WorkflowConfig::default()
        };

        let fragment = agent.run(&state(&["museums"]), &config).await;
        assert!(fragment.degraded);
    }
}
