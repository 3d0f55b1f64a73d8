//! Planner role
//!
//! Spreads the ranked attractions over the trip days and prices every
//! entry from the budget breakdown.
//!
//! Placement is greedy in rank order. Each attraction goes to the day with
//! the fewest visits, preferring a day that does not already hold its
//! category, then the day whose stops are closest, then the earliest day.
//! Each day is then walked nearest-neighbour from its best-rated stop.
//! Days without attractions get a template entry.

use crate::agents::budget::{per_visit_cost, MAX_VISITS_PER_DAY};
use crate::agents::{narrate, usd, Narration};
use crate::config::WorkflowConfig;
use crate::gemini::TextGenerator;
use crate::models::{
    round_cents, Attraction, AttractionRef, CostCategory, DayPlan, ItineraryEntry, TimeSlot,
};
use crate::state::TripState;
use crate::tools::{calculate_distance, DistanceEstimate};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Hops longer than this are worth a transit ticket
const WALKING_LIMIT_KM: f64 = 2.0;

const SYSTEM_PROMPT: &str = "You are a travel planner. Write a short, friendly \
overview of a day-by-day itinerary in three or four sentences. Do not invent \
attractions that are not listed.";

/// Output of the planner role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanFragment {
    pub day_plans: Vec<DayPlan>,
    /// One line per inclusion or exclusion
    pub decisions: Vec<String>,
    pub narration: Narration,
    pub recommendations: Vec<String>,
    pub total_cost: f64,
    /// True when the plan is built from templates only
    pub template_only: bool,
}

pub struct PlannerAgent {
    generator: Arc<dyn TextGenerator>,
}

impl PlannerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Requires both research and budget fragments on the state.
    pub async fn run(&self, state: &TripState, config: &WorkflowConfig) -> Result<PlanFragment> {
        let research = state.require_research()?;
        let budget = state.require_budget()?;
        let request = state.request();

        let limit = budget.attraction_limit().min(research.attractions.len());
        let selected = &research.attractions[..limit];
        let template_only = selected.is_empty();

        let days = distribute(selected, request.num_days);
        let per_visit = per_visit_cost(&budget.costs);
        let daily_base = budget.costs.daily_base();
        let allowance = budget.costs.per_day(CostCategory::Activities);

        let mut day_plans = Vec::with_capacity(days.len());
        let mut unrounded_total = 0.0;

        for (index, stops) in days.into_iter().enumerate() {
            let day = index as u32 + 1;
            let ordered = order_day(stops);

            let (entries, activities) = if ordered.is_empty() {
                let interest = request
                    .interests
                    .get(index % request.interests.len().max(1))
                    .map(String::as_str)
                    .unwrap_or("local highlights");
                let cost = if template_only { allowance } else { 0.0 };
                let entry = template_entry(&request.destination, interest, cost, template_only);
                (vec![entry], cost)
            } else {
                let entries: Vec<ItineraryEntry> = ordered
                    .iter()
                    .zip(TimeSlot::ORDER)
                    .map(|(&(attraction, leg), slot)| visit_entry(attraction, slot, per_visit, leg))
                    .collect();
                let activities = per_visit * entries.len() as f64;
                (entries, activities)
            };

            let daily_cost = daily_base + activities;
            unrounded_total += daily_cost;

            day_plans.push(DayPlan {
                day,
                summary: day_summary(day, &request.destination, &entries),
                entries,
                daily_cost: round_cents(daily_cost),
            });
        }

        let total_cost = round_cents(unrounded_total);
        let decisions = decisions(state, &day_plans, limit);
        let recommendations = recommendations(state, &day_plans, template_only);

        info!(
            destination = %request.destination,
            days = day_plans.len(),
            scheduled = limit,
            total_cost,
            template_only,
            "Itinerary planned"
        );

        let template = plan_template(state, &day_plans, limit, total_cost);
        let prompt = plan_prompt(state, &day_plans);
        let narration = narrate(
            self.generator.as_ref(),
            SYSTEM_PROMPT,
            &prompt,
            config.generation_timeout,
            || template,
        )
        .await;

        Ok(PlanFragment {
            day_plans,
            decisions,
            narration,
            recommendations,
            total_cost,
            template_only,
        })
    }
}

/// Distance between two attractions, if both are located and valid
fn hop(a: &Attraction, b: &Attraction) -> Option<DistanceEstimate> {
    let (from, to) = (a.coordinates?, b.coordinates?);
    match calculate_distance(from, to) {
        Ok(estimate) => Some(estimate),
        Err(e) => {
            debug!(from = %a.name, to = %b.name, error = %e, "Skipping distance");
            None
        }
    }
}

fn nearest_km(stops: &[&Attraction], attraction: &Attraction) -> f64 {
    if stops.is_empty() {
        return 0.0;
    }
    stops
        .iter()
        .filter_map(|stop| hop(stop, attraction))
        .map(|estimate| estimate.distance_km)
        .min_by(f64::total_cmp)
        .unwrap_or(f64::INFINITY)
}

/// Greedy placement of ranked attractions into `num_days` days
pub fn distribute(selected: &[Attraction], num_days: u32) -> Vec<Vec<&Attraction>> {
    let mut days: Vec<Vec<&Attraction>> = vec![Vec::new(); num_days as usize];

    for attraction in selected {
        let key = |day: &Vec<&Attraction>| {
            (
                day.len(),
                day.iter().any(|s| s.category == attraction.category),
                nearest_km(day, attraction),
            )
        };

        let best = (0..days.len())
            .filter(|&d| days[d].len() < MAX_VISITS_PER_DAY)
            .min_by(|&a, &b| {
                let (len_a, dup_a, km_a) = key(&days[a]);
                let (len_b, dup_b, km_b) = key(&days[b]);
                len_a
                    .cmp(&len_b)
                    .then(dup_a.cmp(&dup_b))
                    .then(km_a.total_cmp(&km_b))
                    .then(a.cmp(&b))
            });

        if let Some(day) = best {
            days[day].push(attraction);
        }
    }

    days
}

/// Nearest-neighbour walk from the best-rated stop. Unlocated stops sort
/// last, in rank order.
fn order_day(stops: Vec<&Attraction>) -> Vec<(&Attraction, Option<DistanceEstimate>)> {
    let mut remaining = stops;
    let mut ordered: Vec<(&Attraction, Option<DistanceEstimate>)> =
        Vec::with_capacity(remaining.len());

    let start = remaining
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.rating.total_cmp(&b.rating).then(ib.cmp(ia)))
        .map(|(i, _)| i);

    let Some(start) = start else {
        return ordered;
    };

    let mut current = remaining.remove(start);
    ordered.push((current, None));

    while !remaining.is_empty() {
        let (next, estimate) = remaining
            .iter()
            .enumerate()
            .map(|(i, candidate)| (i, hop(current, candidate)))
            .min_by(|(ia, da), (ib, db)| {
                let km = |d: &Option<DistanceEstimate>| d.map_or(f64::INFINITY, |e| e.distance_km);
                km(da).total_cmp(&km(db)).then(ia.cmp(ib))
            })
            .unwrap_or((0, None));

        current = remaining.remove(next);
        ordered.push((current, estimate));
    }

    ordered
}

fn visit_entry(
    attraction: &Attraction,
    slot: TimeSlot,
    per_visit: f64,
    leg: Option<DistanceEstimate>,
) -> ItineraryEntry {
    let mut reasoning = format!(
        "Rated {:.1} and matches your interest in {}",
        attraction.rating, attraction.category
    );
    match &leg {
        Some(estimate) => reasoning.push_str(&format!(
            "; {:.1} km from the previous stop.",
            estimate.distance_km
        )),
        None => reasoning.push('.'),
    }

    ItineraryEntry {
        time_slot: slot,
        time: slot.window().to_string(),
        duration_hours: slot.duration_hours(),
        title: format!("Visit {}", attraction.name),
        description: attraction.description().map(str::to_string),
        attraction: Some(AttractionRef::from(attraction)),
        estimated_cost: round_cents(per_visit),
        reasoning,
        travel_from_previous_km: leg.map(|e| e.distance_km),
        travel_from_previous_minutes: leg.map(|e| (e.travel_hours() * 60.0).round() as u32),
    }
}

fn template_entry(
    destination: &str,
    interest: &str,
    cost: f64,
    template_only: bool,
) -> ItineraryEntry {
    let slot = TimeSlot::Morning;
    let reasoning = if template_only {
        format!(
            "No attraction data was available, so this day follows a general {} outline.",
            interest
        )
    } else {
        "Every selected attraction fits on the other days, so this day is left open.".to_string()
    };

    ItineraryEntry {
        time_slot: slot,
        time: slot.window().to_string(),
        duration_hours: slot.duration_hours(),
        title: format!("Explore {} with a focus on {}", destination, interest),
        description: None,
        attraction: None,
        estimated_cost: round_cents(cost),
        reasoning,
        travel_from_previous_km: None,
        travel_from_previous_minutes: None,
    }
}

fn day_summary(day: u32, destination: &str, entries: &[ItineraryEntry]) -> String {
    let names: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.attraction.as_ref().map(|a| a.name.as_str()))
        .collect();

    if names.is_empty() {
        format!("Day {}: free day exploring {}", day, destination)
    } else {
        format!("Day {}: {}", day, names.join(", "))
    }
}

fn decisions(state: &TripState, day_plans: &[DayPlan], limit: usize) -> Vec<String> {
    let request = state.request();
    let attractions = state.attractions();
    let capacity = request.num_days as usize * MAX_VISITS_PER_DAY;
    let mut lines = Vec::new();

    if attractions.is_empty() {
        lines.push(
            "No attractions were available, so each day follows a general template \
             built from cost data."
                .to_string(),
        );
        return lines;
    }

    for plan in day_plans {
        for entry in &plan.entries {
            if let Some(attraction) = &entry.attraction {
                lines.push(format!(
                    "Included {} on day {} in the {} slot: {}",
                    attraction.name,
                    plan.day,
                    entry.time_slot.to_string().to_lowercase(),
                    entry.reasoning
                ));
            }
        }
    }

    let over_budget: Vec<&Attraction> = attractions.iter().take(capacity).skip(limit).collect();
    let over_capacity: Vec<&Attraction> = attractions.iter().skip(capacity.max(limit)).collect();

    if !over_budget.is_empty() {
        lines.push(format!(
            "Excluded to stay closer to the budget, keeping only the top {}: {}.",
            limit,
            names(&over_budget)
        ));
    }
    if !over_capacity.is_empty() {
        lines.push(format!(
            "Excluded because a {}-day trip has room for {} visits: {}.",
            request.num_days,
            capacity,
            names(&over_capacity)
        ));
    }

    lines
}

fn names(attractions: &[&Attraction]) -> String {
    attractions
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn recommendations(state: &TripState, day_plans: &[DayPlan], template_only: bool) -> Vec<String> {
    let request = state.request();
    let mut out = Vec::new();

    if let Some(budget) = state.budget() {
        match &budget.adjustment {
            Some(adjustment) => {
                out.push(format!(
                    "The full plan costs {}, which is {} over budget; this itinerary keeps the top {} attraction(s).",
                    usd(budget.original_total),
                    usd(budget.original_total - request.budget_usd),
                    adjustment.attraction_limit
                ));
                if adjustment.travel_style != request.travel_style {
                    out.push(format!(
                        "Switching to {} travel would bring the total to {}.",
                        adjustment.travel_style,
                        usd(adjustment.adjusted_total)
                    ));
                }
                if !adjustment.fits_budget {
                    out.push(
                        "Even the reduced plan exceeds the budget; consider a larger budget or a shorter trip."
                            .to_string(),
                    );
                }
            }
            None => {
                let spare = request.budget_usd - budget.original_total;
                if spare > 0.0 {
                    out.push(format!(
                        "About {} of the budget is left for dining, shopping or extra activities.",
                        usd(spare)
                    ));
                }
            }
        }

        if budget.default_estimate_used {
            out.push(format!(
                "Costs for {} are general estimates; check local prices before booking.",
                request.destination
            ));
        }
    }

    if template_only {
        out.push(format!(
            "Attraction data was unavailable; ask a local tourist office for sights matching {}.",
            request.interests.join(", ")
        ));
    } else {
        out.push("Book popular attractions in advance to avoid long queues.".to_string());
    }

    let long_hops = day_plans
        .iter()
        .flat_map(|d| d.entries.iter())
        .filter_map(|e| e.travel_from_previous_km)
        .any(|km| km > WALKING_LIMIT_KM);
    if long_hops {
        out.push(format!(
            "Some stops are more than {:.0} km apart; a public transport pass will save time.",
            WALKING_LIMIT_KM
        ));
    }

    out
}

fn plan_prompt(state: &TripState, day_plans: &[DayPlan]) -> String {
    let request = state.request();
    let mut prompt = format!(
        "Write an overview of this {}-day {} itinerary for {} (interests: {}).\n",
        request.num_days,
        request.travel_style,
        request.destination,
        request.interests.join(", ")
    );
    for plan in day_plans {
        prompt.push_str(&format!("- {}\n", plan.summary));
    }
    prompt
}

fn plan_template(state: &TripState, day_plans: &[DayPlan], scheduled: usize, total: f64) -> String {
    let request = state.request();
    if scheduled == 0 {
        return format!(
            "A {}-day {} itinerary for {} built from general suggestions, with an estimated cost of {}.",
            day_plans.len(),
            request.travel_style,
            request.destination,
            usd(total)
        );
    }
    format!(
        "A {}-day {} itinerary for {} with {} scheduled visits, grouped to keep travel between stops short. Estimated cost: {}.",
        day_plans.len(),
        request.travel_style,
        request.destination,
        scheduled,
        usd(total)
    )
}
