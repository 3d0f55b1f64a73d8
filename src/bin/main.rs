//! One-shot planning run from the command line
//!
//! Without positional arguments a 4-day mid-range Paris trip is planned.

use clap::Parser;
use futures::StreamExt;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trip_planner_orchestrator::{
    config::Settings,
    models::{PlanningStatus, TravelStyle, TripRequest},
    service::PlanningService,
    workflow::WorkflowEvent,
};

#[derive(Parser, Debug)]
#[command(name = "trip-planner", about = "Plan a multi-day trip and print the itinerary as JSON")]
struct Cli {
    /// Use the built-in attraction catalogue and text generator
    #[arg(long)]
    offline: bool,

    /// Destination city
    #[arg(default_value = "Paris")]
    destination: String,

    /// Number of days
    #[arg(default_value_t = 4)]
    days: u32,

    /// Total budget in USD
    #[arg(default_value_t = 2500.0)]
    budget_usd: f64,

    /// budget, mid-range or luxury
    #[arg(default_value = "mid-range")]
    style: TravelStyle,

    /// Interests such as museums, food or parks
    #[arg(default_values_t = ["museums".to_string(), "food".to_string()])]
    interests: Vec<String>,
}

impl Cli {
    fn request(&self) -> TripRequest {
        TripRequest {
            destination: self.destination.clone(),
            num_days: self.days,
            budget_usd: self.budget_usd,
            travel_style: self.style,
            interests: self.interests.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let request = cli.request();
    let offline = cli.offline;

    let service = if offline {
        PlanningService::offline(settings.workflow_config())
    } else {
        PlanningService::from_settings(&settings)?
    };

    info!(destination = %request.destination, offline, "Running planner");

    let mut events = Box::pin(service.plan_stream(request));
    let mut final_result = None;

    while let Some(event) = events.next().await {
        match event {
            WorkflowEvent::StageStarted { stage, .. } => eprintln!("[{}] started", stage),
            WorkflowEvent::StageCompleted { stage, summary, .. } => {
                eprintln!("[{}] done: {}", stage, summary)
            }
            WorkflowEvent::Finished { stage, result, .. } => {
                eprintln!("[{}]", stage);
                final_result = Some(result);
            }
        }
    }

    let Some(result) = final_result else {
        eprintln!("planning run ended without a result");
        return Ok(ExitCode::FAILURE);
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(match result.status {
        PlanningStatus::Completed => ExitCode::SUCCESS,
        PlanningStatus::Failed => ExitCode::FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request() {
        let cli = Cli::try_parse_from([
            "trip-planner", "Tokyo", "5", "3000", "Luxury", "food", "culture",
        ])
        .unwrap();
        let request = cli.request();
        assert!(!cli.offline);
        assert_eq!(request.destination, "Tokyo");
        assert_eq!(request.num_days, 5);
        assert_eq!(request.travel_style, TravelStyle::Luxury);
        assert_eq!(request.interests, vec!["food", "culture"]);
    }

    #[test]
    fn test_defaults_plan_paris() {
        let cli = Cli::try_parse_from(["trip-planner", "--offline"]).unwrap();
        let request = cli.request();
        assert!(cli.offline);
        assert_eq!(request.destination, "Paris");
        assert_eq!(request.num_days, 4);
        assert_eq!(request.travel_style, TravelStyle::MidRange);
        assert_eq!(request.interests, vec!["museums", "food"]);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["trip-planner", "Tokyo", "five"]).is_err());
        assert!(Cli::try_parse_from(["trip-planner", "Tokyo", "5", "3000", "cheap", "food"]).is_err());
        assert!(Cli::try_parse_from(["trip-planner", "--verbose"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
