//! Trip state
//!
//! The aggregate threaded through one planning run. It is updated
//! functionally: each `with_*` call consumes the state and returns the next
//! version, and refuses fragments that arrive out of order. A role only
//! ever sees a shared reference, so it cannot write another role's fields.

use crate::agents::{BudgetFragment, PlanFragment, ResearchFragment};
use crate::error::PlannerError;
use crate::models::{
    Attraction, BudgetStatus, Itinerary, QualityFlags, TripRequest,
};
use crate::Result;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct TripState {
    request: TripRequest,
    research: Option<ResearchFragment>,
    budget: Option<BudgetFragment>,
    plan: Option<PlanFragment>,
    itinerary_text: String,
}

impl TripState {
    pub fn new(request: TripRequest) -> Self {
        Self {
            request,
            research: None,
            budget: None,
            plan: None,
            itinerary_text: String::new(),
        }
    }

    pub fn request(&self) -> &TripRequest {
        &self.request
    }

    pub fn budget(&self) -> Option<&BudgetFragment> {
        self.budget.as_ref()
    }

    /// Ranked attractions; empty until research has run
    pub fn attractions(&self) -> &[Attraction] {
        self.research
            .as_ref()
            .map(|r| r.attractions.as_slice())
            .unwrap_or_default()
    }

    pub fn itinerary_text(&self) -> &str {
        &self.itinerary_text
    }

    pub fn quality(&self) -> QualityFlags {
        let generation_fallback = [
            self.research.as_ref().map(|r| r.narration.fallback_used),
            self.budget.as_ref().map(|b| b.narration.fallback_used),
            self.plan.as_ref().map(|p| p.narration.fallback_used),
        ]
        .into_iter()
        .flatten()
        .any(|used| used);

        QualityFlags {
            degraded_research: self
                .research
                .as_ref()
                .map(|r| r.degraded || r.attractions.is_empty())
                .unwrap_or(false),
            default_cost_estimate: self
                .budget
                .as_ref()
                .map(|b| b.default_estimate_used)
                .unwrap_or(false),
            generation_fallback,
        }
    }

    pub fn low_confidence(&self) -> bool {
        let quality = self.quality();
        quality.degraded_research || quality.generation_fallback
    }

    pub(crate) fn require_research(&self) -> Result<&ResearchFragment> {
        self.research.as_ref().ok_or_else(|| {
            PlannerError::StateError("research fragment is missing".to_string())
        })
    }

    pub(crate) fn require_budget(&self) -> Result<&BudgetFragment> {
        self.budget
            .as_ref()
            .ok_or_else(|| PlannerError::StateError("budget fragment is missing".to_string()))
    }

    pub fn with_research(mut self, fragment: ResearchFragment) -> Result<Self> {
        if self.research.is_some() {
            return Err(PlannerError::StateError(
                "research fragment already recorded".to_string(),
            ));
        }

        self.append_section("Research", &fragment.narration.text);
        self.research = Some(fragment);
        Ok(self)
    }

    pub fn with_budget(mut self, fragment: BudgetFragment) -> Result<Self> {
        self.require_research()?;
        if self.budget.is_some() {
            return Err(PlannerError::StateError(
                "budget fragment already recorded".to_string(),
            ));
        }

        self.append_section("Budget", &fragment.narration.text);
        self.budget = Some(fragment);
        Ok(self)
    }

    pub fn with_plan(mut self, fragment: PlanFragment) -> Result<Self> {
        self.require_budget()?;
        if self.plan.is_some() {
            return Err(PlannerError::StateError(
                "plan fragment already recorded".to_string(),
            ));
        }

        let mut body = fragment.narration.text.clone();
        for day in &fragment.day_plans {
            body.push_str(&format!("\n\n{}", day.summary));
            for entry in &day.entries {
                body.push_str(&format!("\n- {} {}", entry.time, entry.title));
            }
        }
        if !fragment.decisions.is_empty() {
            body.push_str("\n\nWhy these choices:");
            for decision in &fragment.decisions {
                body.push_str(&format!("\n- {}", decision));
            }
        }

        self.append_section("Itinerary", &body);
        self.plan = Some(fragment);
        Ok(self)
    }

    fn append_section(&mut self, title: &str, body: &str) {
        if !self.itinerary_text.is_empty() {
            self.itinerary_text.push_str("\n\n");
        }
        self.itinerary_text.push_str(&format!("## {}\n{}", title, body));
    }

    /// Final itinerary. Fails unless every role has contributed.
    pub fn into_itinerary(self) -> Result<Itinerary> {
        let quality = self.quality();
        let low_confidence = self.low_confidence();

        let TripState {
            request,
            budget,
            plan,
            itinerary_text,
            ..
        } = self;

        let budget = budget
            .ok_or_else(|| PlannerError::StateError("budget fragment is missing".to_string()))?;
        let plan =
            plan.ok_or_else(|| PlannerError::StateError("plan fragment is missing".to_string()))?;

        Ok(Itinerary {
            destination: request.destination,
            duration_days: request.num_days,
            travel_style: request.travel_style,
            total_budget: request.budget_usd,
            day_plans: plan.day_plans,
            total_cost: plan.total_cost,
            original_total: budget.original_total,
            adjusted_total: budget.adjustment.as_ref().map(|a| a.adjusted_total),
            budget_compliant: budget.budget_compliant,
            budget_status: if budget.budget_compliant {
                BudgetStatus::WithinBudget
            } else {
                BudgetStatus::OverBudget
            },
            cost_breakdown: budget.breakdown,
            itinerary_text,
            recommendations: plan.recommendations,
            low_confidence,
            quality,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{BudgetAgent, Narration, PlannerAgent};
    use crate::config::WorkflowConfig;
    use crate::gemini::MockGenerator;
    use crate::models::TravelStyle;
    use crate::tools::paris_catalogue;
    use std::sync::Arc;

    fn request() -> TripRequest {
        TripRequest {
            destination: "Paris".to_string(),
            num_days: 2,
            budget_usd: 1500.0,
            travel_style: TravelStyle::MidRange,
            interests: vec!["museums".to_string()],
        }
    }

    fn research(attractions: Vec<Attraction>) -> ResearchFragment {
        ResearchFragment {
            degraded: attractions.is_empty(),
            attractions,
            failed_interests: Vec::new(),
            narration: Narration {
                text: "Paris has great museums.".to_string(),
                fallback_used: false,
            },
        }
    }

    #[test]
    fn test_budget_unknown_before_budget_role() {
        let state = TripState::new(request())
            .with_research(research(paris_catalogue()))
            .unwrap();
        assert_eq!(state.attractions().len(), 12);
        assert!(state.budget().is_none());
        assert!(state.itinerary_text().starts_with("## Research"));
    }

    #[test]
    fn test_research_cannot_be_recorded_twice() {
        let state = TripState::new(request())
            .with_research(research(Vec::new()))
            .unwrap();
        assert!(matches!(
            state.with_research(research(Vec::new())),
            Err(PlannerError::StateError(_))
        ));
    }

    #[tokio::test]
    async fn test_full_state_builds_itinerary() {
        let config = WorkflowConfig::default();
        let generator = Arc::new(MockGenerator::new());

        let state = TripState::new(request())
            .with_research(research(paris_catalogue()[..3].to_vec()))
            .unwrap();
        let budget = BudgetAgent::new(generator.clone()).run(&state, &config).await.unwrap();
        let state = state.with_budget(budget).unwrap();
        assert_eq!(state.budget().map(|b| b.costs.estimates.len()), Some(4));

        let plan = PlannerAgent::new(generator).run(&state, &config).await.unwrap();
        let state = state.with_plan(plan).unwrap();
        let itinerary = state.into_itinerary().unwrap();

        assert_eq!(itinerary.duration_days, 2);
        assert_eq!(itinerary.day_plans.len(), 2);
        assert_eq!(itinerary.budget_status, BudgetStatus::WithinBudget);
        assert!(itinerary.adjusted_total.is_none());
        assert!(!itinerary.low_confidence);
        assert!(itinerary.itinerary_text.contains("## Budget"));
        assert!(itinerary.itinerary_text.contains("Why these choices"));
    }

    #[test]
    fn test_incomplete_state_has_no_itinerary() {
        let state = TripState::new(request())
            .with_research(research(Vec::new()))
            .unwrap();
        assert!(state.low_confidence());
        assert!(state.into_itinerary().is_err());
    }
}
