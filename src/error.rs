//! Error types for the trip planner orchestrator

use thiserror::Error;

use crate::workflow::Stage;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Error, Debug)]
pub enum PlannerError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Trip state error: {0}")]
    StateError(String),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures a data tool may report. All of them are recoverable: the
/// caller substitutes an empty or default value and carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// Text generation provider failure (after retry the caller falls back to a
/// templated fragment).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        ToolError::LookupUnavailable(e.to_string())
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Unavailable(e.to_string())
    }
}
