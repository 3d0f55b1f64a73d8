//! Workflow orchestrator
//!
//! Drives one planning run through the stage machine:
//!
//! INIT → RESEARCHING → BUDGETING → PLANNING → DONE
//!
//! The workflow is shared across requests; every call gets its own
//! [`TripState`] and [`StageMachine`]. Role failures are absorbed inside the
//! roles, so only a malformed request or a broken state hand-off ends in
//! FAILED.
//!
//! In streaming mode every transition is sent on a bounded channel before
//! the next role starts, so a slow consumer pauses the run between stages.
//! If the consumer goes away the role in flight is dropped (its pending tool
//! calls with it) and no further role runs.

use crate::agents::{BudgetAgent, PlannerAgent, ResearcherAgent};
use crate::config::WorkflowConfig;
use crate::error::PlannerError;
use crate::gemini::TextGenerator;
use crate::models::{Itinerary, PlanningResult, TripRequest};
use crate::state::TripState;
use crate::tools::AttractionSearch;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod stage;

pub use stage::{Stage, StageMachine};

/// Progress notification emitted once per transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StageStarted {
        sequence: u64,
        request_id: String,
        stage: Stage,
    },
    StageCompleted {
        sequence: u64,
        request_id: String,
        stage: Stage,
        summary: String,
    },
    Finished {
        sequence: u64,
        request_id: String,
        stage: Stage,
        result: PlanningResult,
    },
}

impl WorkflowEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            WorkflowEvent::StageStarted { sequence, .. }
            | WorkflowEvent::StageCompleted { sequence, .. }
            | WorkflowEvent::Finished { sequence, .. } => *sequence,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            WorkflowEvent::StageStarted { stage, .. }
            | WorkflowEvent::StageCompleted { stage, .. }
            | WorkflowEvent::Finished { stage, .. } => *stage,
        }
    }

    /// Event name used on the wire (SSE `event:` field)
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::StageStarted { .. } => "stage_started",
            WorkflowEvent::StageCompleted { .. } => "stage_completed",
            WorkflowEvent::Finished { .. } => "finished",
        }
    }
}

/// New request id: `trip_` followed by 8 hex digits
pub fn new_request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("trip_{}", &id[..8])
}

/// Per-request bookkeeping: stage machine, event sink and sequence counter
struct PlanningRun {
    request_id: String,
    machine: StageMachine,
    events: Option<mpsc::Sender<WorkflowEvent>>,
    sequence: u64,
    started_at: Instant,
}

impl PlanningRun {
    fn new(request_id: String, events: Option<mpsc::Sender<WorkflowEvent>>) -> Self {
        Self {
            request_id,
            machine: StageMachine::new(),
            events,
            sequence: 0,
            started_at: Instant::now(),
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    async fn send(&self, event: WorkflowEvent) -> Result<()> {
        match &self.events {
            None => Ok(()),
            Some(events) => events.send(event).await.map_err(|_| {
                PlannerError::Cancelled("event consumer disconnected".to_string())
            }),
        }
    }

    async fn start(&mut self, stage: Stage) -> Result<()> {
        self.machine.advance(stage)?;
        info!(request_id = %self.request_id, stage = %stage, "Stage started");

        let event = WorkflowEvent::StageStarted {
            sequence: self.next_sequence(),
            request_id: self.request_id.clone(),
            stage,
        };
        self.send(event).await
    }

    async fn complete(&mut self, stage: Stage, summary: String) -> Result<()> {
        debug!(request_id = %self.request_id, stage = %stage, summary = %summary, "Stage completed");

        let event = WorkflowEvent::StageCompleted {
            sequence: self.next_sequence(),
            request_id: self.request_id.clone(),
            stage,
            summary,
        };
        self.send(event).await
    }

    /// Run a role, racing it against consumer disconnect in streaming mode
    async fn guard<F>(&self, work: F) -> Result<F::Output>
    where
        F: Future,
    {
        match &self.events {
            None => Ok(work.await),
            Some(events) => tokio::select! {
                output = work => Ok(output),
                _ = events.closed() => Err(PlannerError::Cancelled(format!(
                    "consumer disconnected during {}",
                    self.machine.current()
                ))),
            },
        }
    }

    /// Enter the terminal stage and emit the final result
    async fn finish(&mut self, stage: Stage, result: PlanningResult) -> PlanningResult {
        if let Err(e) = self.machine.advance(stage) {
            warn!(request_id = %self.request_id, error = %e, "Unexpected terminal transition");
        }

        let path: Vec<String> = self.machine.history().iter().map(Stage::to_string).collect();
        info!(
            request_id = %self.request_id,
            stage = %stage,
            path = %path.join(" -> "),
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "Planning run finished"
        );

        let event = WorkflowEvent::Finished {
            sequence: self.next_sequence(),
            request_id: self.request_id.clone(),
            stage,
            result: result.clone(),
        };
        if self.send(event).await.is_err() {
            debug!(request_id = %self.request_id, "Final event dropped, consumer gone");
        }

        result
    }
}

/// Fixed-topology pipeline over the three roles
pub struct Workflow {
    researcher: ResearcherAgent,
    budget: BudgetAgent,
    planner: PlannerAgent,
    config: WorkflowConfig,
}

impl Workflow {
    pub fn new(
        search: Arc<dyn AttractionSearch>,
        generator: Arc<dyn TextGenerator>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            researcher: ResearcherAgent::new(search, generator.clone()),
            budget: BudgetAgent::new(generator.clone()),
            planner: PlannerAgent::new(generator),
            config,
        }
    }

    /// Plan a trip to completion. Always returns a well-formed result.
    pub async fn run(&self, request: TripRequest) -> PlanningResult {
        self.execute(request, None).await
    }

    /// Plan a trip, sending one event per transition on `events`.
    pub async fn run_streaming(
        &self,
        request: TripRequest,
        events: mpsc::Sender<WorkflowEvent>,
    ) -> PlanningResult {
        self.execute(request, Some(events)).await
    }

    async fn execute(
        &self,
        request: TripRequest,
        events: Option<mpsc::Sender<WorkflowEvent>>,
    ) -> PlanningResult {
        let mut run = PlanningRun::new(new_request_id(), events);

        info!(
            request_id = %run.request_id,
            destination = %request.destination,
            days = request.num_days,
            "Planning run started"
        );

        match self.drive(&mut run, request).await {
            Ok(itinerary) => {
                let result = PlanningResult::completed(run.request_id.clone(), itinerary);
                run.finish(Stage::Done, result).await
            }
            Err(PlannerError::Cancelled(reason)) => {
                warn!(request_id = %run.request_id, reason = %reason, "Planning run cancelled");
                if let Err(e) = run.machine.fail() {
                    debug!(error = %e, "Cancelled run already terminal");
                }
                PlanningResult::failed(run.request_id.clone(), format!("cancelled: {}", reason))
            }
            Err(e) => {
                error!(request_id = %run.request_id, error = %e, "Planning run failed");
                let result = PlanningResult::failed(run.request_id.clone(), e.to_string());
                run.finish(Stage::Failed, result).await
            }
        }
    }

    async fn drive(&self, run: &mut PlanningRun, request: TripRequest) -> Result<Itinerary> {
        let request = request.validated()?;
        let state = TripState::new(request);

        // === RESEARCHING ===
        run.start(Stage::Researching).await?;
        let research = run.guard(self.researcher.run(&state, &self.config)).await?;
        let summary = if research.degraded {
            "attraction data unavailable, continuing with cost data only".to_string()
        } else {
            format!("{} attractions found", research.attractions.len())
        };
        let state = state.with_research(research)?;
        run.complete(Stage::Researching, summary).await?;

        // === BUDGETING ===
        run.start(Stage::Budgeting).await?;
        let budget = run.guard(self.budget.run(&state, &self.config)).await??;
        let summary = format!(
            "total ${:.2}, {}",
            budget.original_total,
            if budget.budget_compliant {
                "within budget"
            } else {
                "over budget"
            }
        );
        let state = state.with_budget(budget)?;
        run.complete(Stage::Budgeting, summary).await?;

        // === PLANNING ===
        run.start(Stage::Planning).await?;
        let plan = run.guard(self.planner.run(&state, &self.config)).await??;
        let summary = format!(
            "{} days planned, estimated ${:.2}",
            plan.day_plans.len(),
            plan.total_cost
        );
        let state = state.with_plan(plan)?;
        run.complete(Stage::Planning, summary).await?;

        state.into_itinerary()
    }
}
