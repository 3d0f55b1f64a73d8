//! Core data models for the trip planner

use crate::error::PlannerError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const MAX_TRIP_DAYS: u32 = 30;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TravelStyle {
    Budget,
    MidRange,
    Luxury,
}

impl TravelStyle {
    /// Next cheaper style, if any
    pub fn cheaper(self) -> Option<TravelStyle> {
        match self {
            TravelStyle::Luxury => Some(TravelStyle::MidRange),
            TravelStyle::MidRange => Some(TravelStyle::Budget),
            TravelStyle::Budget => None,
        }
    }
}

impl FromStr for TravelStyle {
    type Err = String;

    /// Accepts the wire names, case-insensitively
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "budget" => Ok(TravelStyle::Budget),
            "mid-range" => Ok(TravelStyle::MidRange),
            "luxury" => Ok(TravelStyle::Luxury),
            other => Err(format!(
                "unknown travel style '{}', expected budget, mid-range or luxury",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CostCategory {
    Lodging,
    Food,
    Transport,
    Activities,
}

impl CostCategory {
    pub const ALL: [CostCategory; 4] = [
        CostCategory::Lodging,
        CostCategory::Food,
        CostCategory::Transport,
        CostCategory::Activities,
    ];
}

/// Where a cost estimate came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    /// Curated per-destination data
    Table,
    /// Global default entry, used when the destination is unknown
    DefaultEstimate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    WithinBudget,
    OverBudget,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanningStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Midday,
    Afternoon,
    Evening,
}

impl TimeSlot {
    pub const ORDER: [TimeSlot; 4] = [
        TimeSlot::Morning,
        TimeSlot::Midday,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
    ];

    pub fn window(self) -> &'static str {
        match self {
            TimeSlot::Morning => "09:00 - 11:30",
            TimeSlot::Midday => "12:00 - 14:00",
            TimeSlot::Afternoon => "14:30 - 17:00",
            TimeSlot::Evening => "18:00 - 20:30",
        }
    }

    pub fn duration_hours(self) -> f64 {
        match self {
            TimeSlot::Morning | TimeSlot::Afternoon | TimeSlot::Evening => 2.5,
            TimeSlot::Midday => 2.0,
        }
    }
}

//
// ================= Request =================
//

/// Trip planning request supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripRequest {
    pub destination: String,
    pub num_days: u32,
    pub budget_usd: f64,
    pub travel_style: TravelStyle,
    pub interests: Vec<String>,
}

impl TripRequest {
    /// Check the request and return its normalized form.
    ///
    /// Interests are lower-cased, trimmed and de-duplicated keeping the
    /// caller's order.
    pub fn validated(&self) -> Result<TripRequest> {
        let destination = self.destination.trim();
        if destination.chars().count() < 2 {
            return Err(PlannerError::MalformedRequest(
                "destination must be at least 2 characters".to_string(),
            ));
        }

        if self.num_days == 0 || self.num_days > MAX_TRIP_DAYS {
            return Err(PlannerError::MalformedRequest(format!(
                "num_days must be between 1 and {}, got {}",
                MAX_TRIP_DAYS, self.num_days
            )));
        }

        if !self.budget_usd.is_finite() || self.budget_usd <= 0.0 {
            return Err(PlannerError::MalformedRequest(format!(
                "budget_usd must be positive, got {}",
                self.budget_usd
            )));
        }

        let mut interests: Vec<String> = Vec::with_capacity(self.interests.len());
        for interest in &self.interests {
            let tag = interest.trim().to_lowercase();
            if !tag.is_empty() && !interests.contains(&tag) {
                interests.push(tag);
            }
        }

        if interests.is_empty() {
            return Err(PlannerError::MalformedRequest(
                "at least one interest is required".to_string(),
            ));
        }

        Ok(TripRequest {
            destination: destination.to_string(),
            num_days: self.num_days,
            budget_usd: self.budget_usd,
            travel_style: self.travel_style,
            interests,
        })
    }
}

//
// ================= Research =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A point of interest found by the research tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attraction {
    /// Provider identity, used for de-duplication
    pub id: String,
    pub name: String,
    /// Interest category the attraction was found for
    pub category: String,
    pub coordinates: Option<Coordinates>,
    pub rating: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Attraction {
    /// Provider-supplied blurb, when the source has one
    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").map(String::as_str)
    }
}

//
// ================= Costs =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEstimate {
    pub category: CostCategory,
    pub per_day: f64,
    pub currency: String,
    pub source: EstimateSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub category: CostCategory,
    pub per_day: f64,
    pub total: f64,
    /// Share of the trip total, in percent
    pub share_percent: f64,
}

/// Trip cost split by category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetBreakdown {
    pub categories: Vec<CategoryTotal>,
    pub total: f64,
    pub currency: String,
    pub per_visit_activity_cost: f64,
    pub planned_visits: usize,
}

/// Reduced-scope suggestion produced when a trip exceeds its budget
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetAdjustment {
    pub attraction_limit: usize,
    pub excluded_attractions: usize,
    pub travel_style: TravelStyle,
    pub adjusted_total: f64,
    pub fits_budget: bool,
}

//
// ================= Itinerary =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttractionRef {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl From<&Attraction> for AttractionRef {
    fn from(a: &Attraction) -> Self {
        Self {
            id: a.id.clone(),
            name: a.name.clone(),
            category: a.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryEntry {
    pub time_slot: TimeSlot,
    pub time: String,
    pub duration_hours: f64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attraction: Option<AttractionRef>,
    pub estimated_cost: f64,
    /// Why this stop is in the plan
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_from_previous_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_from_previous_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    pub day: u32,
    pub entries: Vec<ItineraryEntry>,
    pub daily_cost: f64,
    pub summary: String,
}

/// Quality markers describing which fallbacks a run relied on
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityFlags {
    pub degraded_research: bool,
    pub default_cost_estimate: bool,
    pub generation_fallback: bool,
}

/// Final output of a planning run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Itinerary {
    pub destination: String,
    pub duration_days: u32,
    pub travel_style: TravelStyle,
    pub total_budget: f64,
    pub day_plans: Vec<DayPlan>,
    pub total_cost: f64,
    pub original_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_total: Option<f64>,
    pub budget_compliant: bool,
    pub budget_status: BudgetStatus,
    pub cost_breakdown: BudgetBreakdown,
    pub itinerary_text: String,
    pub recommendations: Vec<String>,
    pub low_confidence: bool,
    pub quality: QualityFlags,
    pub created_at: DateTime<Utc>,
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanningResult {
    pub request_id: String,
    pub status: PlanningStatus,
    pub itinerary: Option<Itinerary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PlanningResult {
    pub fn completed(request_id: impl Into<String>, itinerary: Itinerary) -> Self {
        Self {
            request_id: request_id.into(),
            status: PlanningStatus::Completed,
            itinerary: Some(itinerary),
            reason: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: PlanningStatus::Failed,
            itinerary: None,
            reason: Some(reason.into()),
        }
    }
}

/// Round a currency amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl fmt::Display for TravelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TravelStyle::Budget => "budget",
            TravelStyle::MidRange => "mid-range",
            TravelStyle::Luxury => "luxury",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CostCategory::Lodging => "lodging",
            CostCategory::Food => "food",
            CostCategory::Transport => "transport",
            CostCategory::Activities => "activities",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeSlot::Morning => "Morning",
            TimeSlot::Midday => "Midday",
            TimeSlot::Afternoon => "Afternoon",
            TimeSlot::Evening => "Evening",
        };
        write!(f, "{}", s)
    }
}
