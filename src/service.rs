//! Request façade
//!
//! Synchronous and streaming entry points over one shared [`Workflow`].
//! Each call starts an independent planning run.

use crate::config::{Settings, WorkflowConfig};
use crate::gemini::{GeminiClient, MockGenerator};
use crate::models::{PlanningResult, TripRequest};
use crate::tools::{paris_catalogue, MockAttractionSearch, NominatimGeocoder, OpenTripMapSearch};
use crate::workflow::{Workflow, WorkflowEvent};
use crate::Result;
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Events buffered between the run and its consumer. One slot means the
/// run waits at every transition until the consumer has caught up.
const STREAM_BUFFER: usize = 1;

#[derive(Clone)]
pub struct PlanningService {
    workflow: Arc<Workflow>,
}

impl PlanningService {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }

    /// Service backed by OpenTripMap, Nominatim and Gemini
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let geocoder = Arc::new(NominatimGeocoder::new()?);
        let search = OpenTripMapSearch::new(
            settings.opentripmap_api_key.clone(),
            settings.search_radius_km,
            geocoder,
        )?;
        let generator = GeminiClient::new(settings)?;

        info!(
            model = %settings.llm_model,
            search_configured = !settings.opentripmap_api_key.is_empty(),
            generation_configured = !settings.gemini_api_key.is_empty(),
            "Planning service initialized"
        );

        Ok(Self::new(Workflow::new(
            Arc::new(search),
            Arc::new(generator),
            settings.workflow_config(),
        )))
    }

    /// Service backed by in-process mocks, for demos and tests
    pub fn offline(config: WorkflowConfig) -> Self {
        let search = MockAttractionSearch::new(paris_catalogue()).only_for("paris");
        Self::new(Workflow::new(
            Arc::new(search),
            Arc::new(MockGenerator::new()),
            config,
        ))
    }

    /// Block until the run reaches DONE or FAILED
    pub async fn plan(&self, request: TripRequest) -> PlanningResult {
        self.workflow.run(request).await
    }

    /// Start a run and return its events. The run stops early if the
    /// returned stream is dropped.
    pub fn plan_stream(
        &self,
        request: TripRequest,
    ) -> impl Stream<Item = WorkflowEvent> + Send + 'static {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let workflow = self.workflow.clone();

        tokio::spawn(async move {
            workflow.run_streaming(request, tx).await;
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanningStatus, TravelStyle};
    use crate::workflow::Stage;
    use futures::StreamExt;

    fn request(destination: &str) -> TripRequest {
        TripRequest {
            destination: destination.to_string(),
            num_days: 3,
            budget_usd: 2000.0,
            travel_style: TravelStyle::MidRange,
            interests: vec!["museums".to_string()],
        }
    }

    #[tokio::test]
    async fn test_offline_plan() {
        let service = PlanningService::offline(WorkflowConfig::default());
        let result = service.plan(request("Paris")).await;
        assert_eq!(result.status, PlanningStatus::Completed);
        assert_eq!(result.itinerary.unwrap().day_plans.len(), 3);
    }

    #[tokio::test]
    async fn test_offline_other_destination_is_template() {
        let service = PlanningService::offline(WorkflowConfig::default());
        let itinerary = service.plan(request("Lisbon")).await.itinerary.unwrap();
        assert!(itinerary.low_confidence);
        assert!(itinerary
            .day_plans
            .iter()
            .all(|d| d.entries.iter().all(|e| e.attraction.is_none())));
    }

    #[tokio::test]
    async fn test_stream_ends_with_finished() {
        let service = PlanningService::offline(WorkflowConfig::default());
        let events: Vec<WorkflowEvent> = service.plan_stream(request("Paris")).collect().await;

        assert_eq!(events.len(), 7);
        assert_eq!(events[0].stage(), Stage::Researching);
        match events.last() {
            Some(WorkflowEvent::Finished { stage, result, .. }) => {
                assert_eq!(*stage, Stage::Done);
                assert_eq!(result.status, PlanningStatus::Completed);
            }
            other => panic!("unexpected final event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let service = PlanningService::offline(WorkflowConfig::default());
        let (a, b) = tokio::join!(service.plan(request("Paris")), service.plan(request("Rome")));

        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.itinerary.unwrap().destination, "Paris");
        assert_eq!(b.itinerary.unwrap().destination, "Rome");
    }
}
