//! Budget role
//!
//! Prices the trip from the cost table and the researched attraction list,
//! and when the total exceeds the budget proposes a reduced scope. The
//! original total is always kept next to the adjusted one.

use crate::agents::{narrate, usd, Narration};
use crate::config::WorkflowConfig;
use crate::gemini::TextGenerator;
use crate::models::{
    round_cents, BudgetAdjustment, BudgetBreakdown, CategoryTotal, CostCategory, TravelStyle,
};
use crate::state::TripState;
use crate::tools::cost::CURRENCY;
use crate::tools::{estimate_costs, CostSheet};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Standard pace: the daily activity allowance covers this many visits
pub const VISITS_PER_ACTIVITY_DAY: f64 = 3.0;

/// Hard cap on visits the planner may place in one day
pub const MAX_VISITS_PER_DAY: usize = 4;

const SYSTEM_PROMPT: &str = "You are a travel budget analyst. Explain a trip \
cost breakdown in plain language in two or three sentences, and say clearly \
whether it fits the traveller's budget.";

/// Output of the budget role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetFragment {
    pub costs: CostSheet,
    pub breakdown: BudgetBreakdown,
    pub original_total: f64,
    pub budget_compliant: bool,
    /// Present only when the original total exceeds the budget
    pub adjustment: Option<BudgetAdjustment>,
    pub default_estimate_used: bool,
    pub narration: Narration,
}

impl BudgetFragment {
    /// Number of attractions the planner may schedule
    pub fn attraction_limit(&self) -> usize {
        self.adjustment
            .as_ref()
            .map(|a| a.attraction_limit)
            .unwrap_or(self.breakdown.planned_visits)
    }
}

pub struct BudgetAgent {
    generator: Arc<dyn TextGenerator>,
}

impl BudgetAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Requires research to have run; the total is priced against its list.
    pub async fn run(&self, state: &TripState, config: &WorkflowConfig) -> Result<BudgetFragment> {
        let research = state.require_research()?;
        let request = state.request();
        let attraction_count = research.attractions.len();

        let costs = estimate_costs(&request.destination, request.travel_style, request.num_days);
        let breakdown = price_trip(&costs, attraction_count);
        let original_total = breakdown.total;
        let budget_compliant = original_total <= request.budget_usd;

        let adjustment = if budget_compliant {
            None
        } else {
            Some(reduce_scope(
                &request.destination,
                request.travel_style,
                request.num_days,
                request.budget_usd,
                attraction_count,
            ))
        };

        info!(
            destination = %request.destination,
            total = original_total,
            budget = request.budget_usd,
            compliant = budget_compliant,
            default_estimate = costs.is_default(),
            "Budget computed"
        );

        if let Some(adjustment) = &adjustment {
            debug!(
                attraction_limit = adjustment.attraction_limit,
                style = %adjustment.travel_style,
                adjusted_total = adjustment.adjusted_total,
                fits = adjustment.fits_budget,
                "Reduced-scope suggestion"
            );
        }

        let template = budget_template(
            state,
            &costs,
            original_total,
            budget_compliant,
            adjustment.as_ref(),
        );
        let prompt = budget_prompt(state, &breakdown, budget_compliant);
        let narration = narrate(
            self.generator.as_ref(),
            SYSTEM_PROMPT,
            &prompt,
            config.generation_timeout,
            || template,
        )
        .await;

        Ok(BudgetFragment {
            default_estimate_used: costs.is_default(),
            costs,
            breakdown,
            original_total,
            budget_compliant,
            adjustment,
            narration,
        })
    }
}

/// Per-visit activity price for a cost sheet
pub fn per_visit_cost(costs: &CostSheet) -> f64 {
    costs.per_day(CostCategory::Activities) / VISITS_PER_ACTIVITY_DAY
}

fn visit_capacity(num_days: u32) -> usize {
    num_days as usize * MAX_VISITS_PER_DAY
}

/// Price a trip with `visits` paid attractions.
///
/// Lodging, food and transport are charged per day. Activities are charged
/// per visit; a trip with no attractions gets the full daily allowance.
fn price_with_visits(costs: &CostSheet, visits: usize, has_attractions: bool) -> (f64, f64) {
    let days = f64::from(costs.num_days);
    let base = costs.daily_base() * days;
    let activities = if has_attractions {
        per_visit_cost(costs) * visits as f64
    } else {
        costs.per_day(CostCategory::Activities) * days
    };
    (base, activities)
}

/// Category breakdown for the full researched list (up to day capacity)
pub fn price_trip(costs: &CostSheet, attraction_count: usize) -> BudgetBreakdown {
    let days = f64::from(costs.num_days);
    let planned_visits = attraction_count.min(visit_capacity(costs.num_days));
    let (base, activities) = price_with_visits(costs, planned_visits, attraction_count > 0);
    let grand_total = base + activities;

    let categories = CostCategory::ALL
        .iter()
        .map(|&category| {
            let (per_day, total) = match category {
                CostCategory::Activities => (activities / days, activities),
                other => {
                    let per_day = costs.per_day(other);
                    (per_day, per_day * days)
                }
            };
            let share = if grand_total > 0.0 {
                total / grand_total * 100.0
            } else {
                0.0
            };
            CategoryTotal {
                category,
                per_day: round_cents(per_day),
                total: round_cents(total),
                share_percent: (share * 10.0).round() / 10.0,
            }
        })
        .collect();

    BudgetBreakdown {
        categories,
        total: round_cents(grand_total),
        currency: CURRENCY.to_string(),
        per_visit_activity_cost: round_cents(per_visit_cost(costs)),
        planned_visits,
    }
}

/// Largest top-N attraction count that fits, never below one per day;
/// steps the travel style down while the trip still does not fit.
pub fn reduce_scope(
    destination: &str,
    style: TravelStyle,
    num_days: u32,
    budget: f64,
    attraction_count: usize,
) -> BudgetAdjustment {
    let max_visits = attraction_count.min(visit_capacity(num_days));
    let floor = max_visits.min(num_days as usize);
    let mut style = style;

    loop {
        let costs = estimate_costs(destination, style, num_days);
        let per_visit = per_visit_cost(&costs);
        let base = costs.daily_base() * f64::from(num_days);

        let limit = if attraction_count == 0 {
            0
        } else if per_visit <= 0.0 {
            max_visits
        } else {
            let affordable = ((budget - base) / per_visit).floor().max(0.0) as usize;
            affordable.clamp(floor, max_visits)
        };

        let (base, activities) = price_with_visits(&costs, limit, attraction_count > 0);
        let adjusted_total = round_cents(base + activities);
        let fits_budget = adjusted_total <= budget;

        match style.cheaper() {
            Some(cheaper) if !fits_budget => style = cheaper,
            _ => {
                return BudgetAdjustment {
                    attraction_limit: limit,
                    excluded_attractions: attraction_count - limit,
                    travel_style: style,
                    adjusted_total,
                    fits_budget,
                }
            }
        }
    }
}

fn budget_prompt(state: &TripState, breakdown: &BudgetBreakdown, compliant: bool) -> String {
    let request = state.request();
    let mut prompt = format!(
        "Explain this {}-day {} budget for {} (budget {}).\n",
        request.num_days,
        request.travel_style,
        request.destination,
        usd(request.budget_usd)
    );
    for category in &breakdown.categories {
        prompt.push_str(&format!(
            "- {}: {} per day, {} total\n",
            category.category,
            usd(category.per_day),
            usd(category.total)
        ));
    }
    prompt.push_str(&format!(
        "Total: {} ({})\n",
        usd(breakdown.total),
        if compliant { "within budget" } else { "over budget" }
    ));
    prompt
}

fn budget_template(
    state: &TripState,
    costs: &CostSheet,
    original_total: f64,
    compliant: bool,
    adjustment: Option<&BudgetAdjustment>,
) -> String {
    let request = state.request();
    let mut text = format!(
        "Estimated cost for {} days in {} ({}): {} against a budget of {}.",
        request.num_days,
        request.destination,
        request.travel_style,
        usd(original_total),
        usd(request.budget_usd)
    );

    if compliant {
        text.push_str(&format!(
            " This is within budget, leaving {} to spare.",
            usd(request.budget_usd - original_total)
        ));
    } else {
        text.push_str(&format!(
            " This is {} over budget.",
            usd(original_total - request.budget_usd)
        ));
    }

    if let Some(adjustment) = adjustment {
        text.push_str(&format!(
            " A reduced plan with {} attraction(s) at {} level costs {}{}.",
            adjustment.attraction_limit,
            adjustment.travel_style,
            usd(adjustment.adjusted_total),
            if adjustment.fits_budget {
                ""
            } else {
                ", which still exceeds the budget"
            }
        ));
    }

    if costs.is_default() {
        text.push_str(" No destination-specific cost data exists, so general estimates were used.");
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ResearchFragment;
    use crate::gemini::MockGenerator;
    use crate::models::TripRequest;
    use crate::tools::paris_catalogue;

    fn state_with(destination: &str, days: u32, budget: f64, style: TravelStyle, attractions: usize) -> TripState {
        let request = TripRequest {
            destination: destination.to_string(),
            num_days: days,
            budget_usd: budget,
            travel_style: style,
            interests: vec!["museums".to_string(), "food".to_string()],
        };
        let research = ResearchFragment {
            attractions: paris_catalogue().into_iter().take(attractions).collect(),
            failed_interests: Vec::new(),
            degraded: attractions == 0,
            narration: Narration::template("research"),
        };
        TripState::new(request).with_research(research).unwrap()
    }

    fn agent() -> BudgetAgent {
        BudgetAgent::new(Arc::new(MockGenerator::failing()))
    }

    #[test]
    fn test_price_trip_charges_per_visit() {
        let costs = estimate_costs("Paris", TravelStyle::MidRange, 4);
        let breakdown = price_trip(&costs, 6);

        // 230/day base, 50/3 per visit
        assert_eq!(breakdown.planned_visits, 6);
        assert_eq!(breakdown.total, 1020.0);
        assert_eq!(breakdown.per_visit_activity_cost, 16.67);
        let activities = breakdown
            .categories
            .iter()
            .find(|c| c.category == CostCategory::Activities)
            .unwrap();
        assert_eq!(activities.total, 100.0);
        assert_eq!(activities.share_percent, 9.8);

        let shares: f64 = breakdown.categories.iter().map(|c| c.share_percent).sum();
        assert!((shares - 100.0).abs() < 0.5, "{}", shares);
    }

    #[test]
    fn test_price_trip_without_attractions_uses_full_allowance() {
        let costs = estimate_costs("Paris", TravelStyle::MidRange, 4);
        assert_eq!(price_trip(&costs, 0).total, costs.trip_total());
    }

    #[test]
    fn test_visits_are_capped_by_day_capacity() {
        let costs = estimate_costs("Paris", TravelStyle::Budget, 1);
        assert_eq!(price_trip(&costs, 12).planned_visits, MAX_VISITS_PER_DAY);
    }

    #[tokio::test]
    async fn test_within_budget_has_no_adjustment() {
        let state = state_with("Paris", 4, 2500.0, TravelStyle::MidRange, 8);
        let fragment = agent().run(&state, &WorkflowConfig::default()).await.unwrap();

        assert!(fragment.budget_compliant);
        assert!(fragment.adjustment.is_none());
        assert!(!fragment.default_estimate_used);
        assert_eq!(fragment.attraction_limit(), 8);
        assert!(fragment.narration.fallback_used);
        assert!(fragment.narration.text.contains("within budget"));
    }

    #[tokio::test]
    async fn test_over_budget_keeps_both_totals() {
        let full = price_trip(&estimate_costs("Paris", TravelStyle::MidRange, 4), 8).total;
        let budget = (full * 0.9).floor();
        let state = state_with("Paris", 4, budget, TravelStyle::MidRange, 8);

        let fragment = agent().run(&state, &WorkflowConfig::default()).await.unwrap();

        assert!(!fragment.budget_compliant);
        assert_eq!(fragment.original_total, full);
        let adjustment = fragment.adjustment.as_ref().unwrap();
        assert!(adjustment.adjusted_total < fragment.original_total);
        assert!(adjustment.adjusted_total <= budget);
        assert!(adjustment.fits_budget);
        assert!(adjustment.attraction_limit >= 4);
    }

    #[test]
    fn test_reduce_scope_trims_before_changing_style() {
        // Paris mid-range, 4 days: base 920, 16.67 per visit
        let adjustment = reduce_scope("Paris", TravelStyle::MidRange, 4, 1000.0, 8);
        assert_eq!(adjustment.travel_style, TravelStyle::MidRange);
        assert_eq!(adjustment.attraction_limit, 4);
        assert_eq!(adjustment.excluded_attractions, 4);
        assert!(adjustment.fits_budget);
    }

    #[test]
    fn test_reduce_scope_steps_style_down() {
        let adjustment = reduce_scope("Paris", TravelStyle::Luxury, 4, 700.0, 8);
        assert_eq!(adjustment.travel_style, TravelStyle::Budget);
        assert!(adjustment.fits_budget);
    }

    #[test]
    fn test_reduce_scope_reports_when_nothing_fits() {
        let adjustment = reduce_scope("Paris", TravelStyle::MidRange, 4, 50.0, 8);
        assert_eq!(adjustment.travel_style, TravelStyle::Budget);
        assert_eq!(adjustment.attraction_limit, 4);
        assert!(!adjustment.fits_budget);
    }

    #[tokio::test]
    async fn test_unknown_destination_uses_default_estimate() {
        let state = state_with("Atlantis", 3, 500.0, TravelStyle::Budget, 0);
        let fragment = agent().run(&state, &WorkflowConfig::default()).await.unwrap();

        // Default budget rates: 50 + 20 + 10 + 20 per day
        assert!(fragment.default_estimate_used);
        assert_eq!(fragment.original_total, 300.0);
        assert!(fragment.budget_compliant);
        assert!(fragment.narration.text.contains("general estimates"));
    }

    #[tokio::test]
    async fn test_budget_requires_research() {
        let request = TripRequest {
            destination: "Paris".to_string(),
            num_days: 2,
            budget_usd: 1000.0,
            travel_style: TravelStyle::Budget,
            interests: vec!["food".to_string()],
        };
        let result = agent().run(&TripState::new(request), &WorkflowConfig::default()).await;
        assert!(result.is_err());
    }
}
