//! Trip Planner Orchestrator
//!
//! Plans multi-day trips with three cooperating roles:
//! - Researcher finds and ranks attractions for the requested interests
//! - Budget prices the trip and proposes a reduced scope when it overruns
//! - Planner spreads attractions over the days and writes the itinerary
//!
//! PIPELINE:
//! INIT → RESEARCHING → BUDGETING → PLANNING → DONE (or FAILED)
//!
//! External lookups degrade instead of failing the run; only a malformed
//! request ends in FAILED.

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod service;
pub mod state;
pub mod tools;
pub mod workflow;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use service::PlanningService;
pub use workflow::{Stage, Workflow, WorkflowEvent};
