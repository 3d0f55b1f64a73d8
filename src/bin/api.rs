use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trip_planner_orchestrator::{api::start_server, config::Settings, service::PlanningService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if settings.gemini_api_key.is_empty() {
        eprintln!("GEMINI_API_KEY not set; narratives will use templates");
    }
    if settings.opentripmap_api_key.is_empty() {
        eprintln!("OPENTRIPMAP_API_KEY not set; itineraries will be built from cost data only");
    }

    info!("Trip Planner Orchestrator - API Server");
    info!("Bind: {}:{}", settings.api_host, settings.api_port);

    let service = Arc::new(PlanningService::from_settings(&settings)?);

    info!("Planning service initialized");

    start_server(service, &settings).await?;

    Ok(())
}
