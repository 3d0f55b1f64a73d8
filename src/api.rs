//! REST API server for the trip planner
//!
//! Exposes the planning service over HTTP:
//! - `POST /plan` blocks until the run finishes
//! - `POST /plan/stream` pushes one SSE event per stage transition

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{PlanningResult, PlanningStatus, TripRequest};
use crate::service::PlanningService;
use crate::tools::cost::known_destinations;
use crate::workflow::{new_request_id, Stage, WorkflowEvent};

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PlanningService>,
}

/// =============================
/// Info & Health Endpoints
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Trip Planner Orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "plan": "POST /plan",
            "plan_stream": "POST /plan/stream"
        },
        "curated_destinations": known_destinations(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Planning Endpoints
/// =============================

fn rejected(rejection: JsonRejection) -> PlanningResult {
    let request_id = new_request_id();
    warn!(request_id = %request_id, error = %rejection, "Rejected trip request body");
    PlanningResult::failed(request_id, format!("Malformed request: {}", rejection.body_text()))
}

fn status_code(result: &PlanningResult) -> StatusCode {
    match result.status {
        PlanningStatus::Completed => StatusCode::OK,
        PlanningStatus::Failed => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn plan_trip(
    State(state): State<ApiState>,
    payload: Result<Json<TripRequest>, JsonRejection>,
) -> (StatusCode, Json<PlanningResult>) {
    let result = match payload {
        Ok(Json(request)) => {
            info!(destination = %request.destination, days = request.num_days, "Received plan request");
            state.service.plan(request).await
        }
        Err(rejection) => rejected(rejection),
    };

    (status_code(&result), Json(result))
}

fn to_sse(event: WorkflowEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(event.name())
        .id(event.sequence().to_string())
        .json_data(&event)
}

fn sse_response<S>(events: S) -> Response
where
    S: Stream<Item = WorkflowEvent> + Send + 'static,
{
    Sse::new(events.map(to_sse))
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn plan_trip_stream(
    State(state): State<ApiState>,
    payload: Result<Json<TripRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => {
            info!(destination = %request.destination, days = request.num_days, "Received streaming plan request");
            sse_response(state.service.plan_stream(request))
        }
        Err(rejection) => {
            let result = rejected(rejection);
            let finished = WorkflowEvent::Finished {
                sequence: 1,
                request_id: result.request_id.clone(),
                stage: Stage::Failed,
                result,
            };
            sse_response(stream::iter([finished]))
        }
    }
}

/// =============================
/// Router
/// =============================

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(service: Arc<PlanningService>, cors_origins: &[String]) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/plan", post(plan_trip))
        .route("/plan/stream", post(plan_trip_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<PlanningService>,
    settings: &Settings,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service, &settings.cors_origins);
    let addr = format!("{}:{}", settings.api_host, settings.api_port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API Server listening on http://{}", addr);
    info!("Local: http://127.0.0.1:{}", settings.api_port);

    axum::serve(listener, router).await?;

    Ok(())
}
