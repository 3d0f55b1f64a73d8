//! Agent roles
//!
//! Three roles run in a fixed order over one [`TripState`]:
//!
//! RESEARCHER (attractions) → BUDGET (costs) → PLANNER (day-by-day itinerary)
//!
//! Each role reads the state, calls its tools and returns a fragment. Only
//! the workflow merges fragments back into the state. Tool and generation
//! failures never escape a role; they are absorbed into fallback values.
//!
//! [`TripState`]: crate::state::TripState

use crate::gemini::TextGenerator;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub mod budget;
pub mod planner;
pub mod researcher;

pub use budget::{BudgetAgent, BudgetFragment};
pub use planner::{PlanFragment, PlannerAgent};
pub use researcher::{ResearchFragment, ResearcherAgent};

/// Generation attempts per fragment: one call plus one retry
const GENERATION_ATTEMPTS: usize = 2;

/// A natural-language fragment produced by a role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Narration {
    pub text: String,
    /// True when the text came from the template instead of the generator
    pub fallback_used: bool,
}

impl Narration {
    pub fn template(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fallback_used: true,
        }
    }
}

/// Ask the generator for a fragment, retrying once. Falls back to the
/// templated text when both attempts fail or time out.
pub async fn narrate<F>(
    generator: &dyn TextGenerator,
    system: &str,
    prompt: &str,
    timeout: Duration,
    fallback: F,
) -> Narration
where
    F: FnOnce() -> String,
{
    for attempt in 1..=GENERATION_ATTEMPTS {
        match tokio::time::timeout(timeout, generator.generate(system, prompt)).await {
            Ok(Ok(text)) => {
                debug!(generator = generator.name(), attempt, "Generated narration");
                return Narration {
                    text,
                    fallback_used: false,
                };
            }
            Ok(Err(e)) => {
                warn!(generator = generator.name(), attempt, error = %e, "Text generation failed");
            }
            Err(_) => {
                warn!(
                    generator = generator.name(),
                    attempt,
                    timeout_ms = timeout.as_millis() as u64,
                    "Text generation timed out"
                );
            }
        }
    }

    Narration::template(fallback())
}

/// Format a USD amount for narration text
pub(crate) fn usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockGenerator;

    #[tokio::test]
    async fn test_narrate_uses_generator() {
        let generator = MockGenerator::new();
        let narration = narrate(&generator, "sys", "Hello", Duration::from_secs(1), || {
            "template".to_string()
        })
        .await;

        assert!(!narration.fallback_used);
        assert_eq!(narration.text, "[mock] Hello");
        assert_eq!(generator.attempts(), 1);
    }

    #[tokio::test]
    async fn test_narrate_retries_once_then_falls_back() {
        let generator = MockGenerator::failing();
        let narration = narrate(&generator, "sys", "Hello", Duration::from_secs(1), || {
            "template".to_string()
        })
        .await;

        assert!(narration.fallback_used);
        assert_eq!(narration.text, "template");
        assert_eq!(generator.attempts(), 2);
    }

    #[tokio::test]
    async fn test_narrate_falls_back_when_generation_times_out() {
        let generator = MockGenerator::new().with_delay(Duration::from_secs(5));
        let narration = narrate(&generator, "sys", "Hello", Duration::from_millis(20), || {
            "template".to_string()
        })
        .await;

        assert!(narration.fallback_used);
        assert_eq!(narration.text, "template");
        assert_eq!(generator.attempts(), 2);
    }

    #[test]
    fn test_usd_format() {
        assert_eq!(usd(1053.333), "$1053.33");
    }
}
