//! Cost estimation from the bundled per-destination table
//!
//! Daily prices in USD per travel style. Unknown destinations fall back to
//! the global default entry, so estimation never fails.

use crate::models::{CostCategory, CostEstimate, EstimateSource, TravelStyle};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub const CURRENCY: &str = "USD";

/// Daily prices for one travel style
#[derive(Debug, Clone, Copy, PartialEq)]
struct DailyRates {
    lodging: f64,
    food: f64,
    transport: f64,
    activities: f64,
}

impl DailyRates {
    const fn new(lodging: f64, food: f64, transport: f64, activities: f64) -> Self {
        Self {
            lodging,
            food,
            transport,
            activities,
        }
    }

    fn get(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::Lodging => self.lodging,
            CostCategory::Food => self.food,
            CostCategory::Transport => self.transport,
            CostCategory::Activities => self.activities,
        }
    }
}

/// Rates for every style of one destination
#[derive(Debug, Clone, Copy)]
struct StyleRates {
    budget: DailyRates,
    mid_range: DailyRates,
    luxury: DailyRates,
}

impl StyleRates {
    fn for_style(&self, style: TravelStyle) -> DailyRates {
        match style {
            TravelStyle::Budget => self.budget,
            TravelStyle::MidRange => self.mid_range,
            TravelStyle::Luxury => self.luxury,
        }
    }
}

const DEFAULT_RATES: StyleRates = StyleRates {
    budget: DailyRates::new(50.0, 20.0, 10.0, 20.0),
    mid_range: DailyRates::new(120.0, 50.0, 20.0, 50.0),
    luxury: DailyRates::new(300.0, 100.0, 40.0, 100.0),
};

lazy_static! {
    static ref COST_TABLE: HashMap<&'static str, StyleRates> = {
        let mut table: HashMap<&'static str, StyleRates> = HashMap::new();
        let mut add = |name: &'static str, budget: DailyRates, mid_range: DailyRates, luxury: DailyRates| {
            table.insert(name, StyleRates { budget, mid_range, luxury });
        };

        add(
            "paris",
            DailyRates::new(60.0, 25.0, 15.0, 20.0),
            DailyRates::new(150.0, 60.0, 20.0, 50.0),
            DailyRates::new(350.0, 120.0, 40.0, 100.0),
        );
        add(
            "tokyo",
            DailyRates::new(50.0, 20.0, 10.0, 15.0),
            DailyRates::new(120.0, 45.0, 15.0, 40.0),
            DailyRates::new(300.0, 100.0, 30.0, 80.0),
        );
        add(
            "new york",
            DailyRates::new(100.0, 30.0, 13.0, 25.0),
            DailyRates::new(250.0, 70.0, 20.0, 60.0),
            DailyRates::new(500.0, 150.0, 50.0, 120.0),
        );
        add(
            "london",
            DailyRates::new(70.0, 30.0, 15.0, 25.0),
            DailyRates::new(180.0, 65.0, 25.0, 55.0),
            DailyRates::new(400.0, 130.0, 45.0, 110.0),
        );
        add(
            "bali",
            DailyRates::new(25.0, 10.0, 5.0, 15.0),
            DailyRates::new(70.0, 25.0, 10.0, 35.0),
            DailyRates::new(200.0, 60.0, 25.0, 75.0),
        );
        add(
            "bangkok",
            DailyRates::new(20.0, 8.0, 5.0, 12.0),
            DailyRates::new(60.0, 20.0, 10.0, 30.0),
            DailyRates::new(180.0, 50.0, 20.0, 70.0),
        );
        add(
            "barcelona",
            DailyRates::new(55.0, 25.0, 12.0, 20.0),
            DailyRates::new(130.0, 55.0, 18.0, 45.0),
            DailyRates::new(320.0, 110.0, 35.0, 95.0),
        );
        add(
            "dubai",
            DailyRates::new(80.0, 25.0, 15.0, 30.0),
            DailyRates::new(200.0, 60.0, 25.0, 70.0),
            DailyRates::new(500.0, 140.0, 50.0, 150.0),
        );
        add(
            "rome",
            DailyRates::new(60.0, 25.0, 12.0, 20.0),
            DailyRates::new(140.0, 55.0, 18.0, 45.0),
            DailyRates::new(350.0, 115.0, 35.0, 100.0),
        );
        add(
            "sydney",
            DailyRates::new(90.0, 35.0, 15.0, 30.0),
            DailyRates::new(200.0, 70.0, 25.0, 65.0),
            DailyRates::new(450.0, 140.0, 45.0, 130.0),
        );

        table
    };
}

/// Cost estimates for one destination, style and duration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostSheet {
    pub destination_key: String,
    pub travel_style: TravelStyle,
    pub num_days: u32,
    pub estimates: Vec<CostEstimate>,
    pub source: EstimateSource,
}

impl CostSheet {
    pub fn per_day(&self, category: CostCategory) -> f64 {
        self.estimates
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.per_day)
            .sum()
    }

    pub fn daily_total(&self) -> f64 {
        self.estimates.iter().map(|e| e.per_day).sum()
    }

    /// Daily lodging, food and transport (everything but activities)
    pub fn daily_base(&self) -> f64 {
        self.daily_total() - self.per_day(CostCategory::Activities)
    }

    pub fn trip_total(&self) -> f64 {
        self.daily_total() * f64::from(self.num_days)
    }

    pub fn is_default(&self) -> bool {
        self.source == EstimateSource::DefaultEstimate
    }
}

/// Normalize a destination name into a table key.
///
/// `"  New   York, USA "` becomes `"new york"`.
pub fn normalize_destination(destination: &str) -> String {
    let city = destination.split(',').next().unwrap_or_default();
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Estimate daily costs per category. Never fails.
pub fn estimate_costs(destination: &str, style: TravelStyle, num_days: u32) -> CostSheet {
    let destination_key = normalize_destination(destination);

    let (rates, source) = match COST_TABLE.get(destination_key.as_str()) {
        Some(rates) => {
            debug!(destination = %destination_key, "Using destination cost data");
            (rates.for_style(style), EstimateSource::Table)
        }
        None => {
            info!(destination = %destination_key, "No cost data for destination, using defaults");
            (DEFAULT_RATES.for_style(style), EstimateSource::DefaultEstimate)
        }
    };

    let estimates = CostCategory::ALL
        .iter()
        .map(|&category| CostEstimate {
            category,
            per_day: rates.get(category),
            currency: CURRENCY.to_string(),
            source,
        })
        .collect();

    CostSheet {
        destination_key,
        travel_style: style,
        num_days,
        estimates,
        source,
    }
}

/// Destinations with curated cost data
pub fn known_destinations() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = COST_TABLE.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_destination_uses_table() {
        let sheet = estimate_costs("Paris", TravelStyle::MidRange, 4);
        assert_eq!(sheet.source, EstimateSource::Table);
        assert_eq!(sheet.per_day(CostCategory::Lodging), 150.0);
        assert_eq!(sheet.daily_total(), 280.0);
        assert_eq!(sheet.trip_total(), 1120.0);
        assert_eq!(sheet.daily_base(), 230.0);
        assert!(sheet.estimates.iter().all(|e| e.currency == "USD"));
    }

    #[test]
    fn test_unknown_destination_is_exactly_default() {
        for style in [TravelStyle::Budget, TravelStyle::MidRange, TravelStyle::Luxury] {
            let sheet = estimate_costs("Atlantis", style, 3);
            let default = DEFAULT_RATES.for_style(style);

            assert!(sheet.is_default());
            assert_eq!(sheet.estimates.len(), 4);
            for estimate in &sheet.estimates {
                assert_eq!(estimate.source, EstimateSource::DefaultEstimate);
                assert_eq!(estimate.per_day, default.get(estimate.category));
            }
        }
    }

    #[test]
    fn test_destination_normalization() {
        assert_eq!(normalize_destination("  New   York, USA "), "new york");
        assert_eq!(normalize_destination("TOKYO"), "tokyo");
        let sheet = estimate_costs("rome, italy", TravelStyle::Budget, 2);
        assert_eq!(sheet.source, EstimateSource::Table);
        assert_eq!(sheet.destination_key, "rome");
    }

    #[test]
    fn test_table_has_ten_destinations() {
        let names = known_destinations();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"bangkok"));
    }
}
