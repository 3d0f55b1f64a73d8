//! Data tools
//!
//! Stateless lookups the roles call: attraction search, cost estimation and
//! distance calculation. Every network-backed call goes through [`bounded`],
//! so a slow provider turns into a `LookupUnavailable` instead of a stall.

use crate::error::ToolError;
use std::future::Future;
use std::time::Duration;

pub mod cost;
pub mod distance;
pub mod geocode;
pub mod search;

pub use cost::{estimate_costs, normalize_destination, CostSheet};
pub use distance::{calculate_distance, DistanceEstimate};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use search::{
    paris_catalogue, search_attractions, AttractionSearch, MockAttractionSearch,
    OpenTripMapSearch,
};

/// Result type for tool calls
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Run a tool call under a deadline. Timeout maps to `LookupUnavailable`.
pub async fn bounded<T, F>(timeout: Duration, tool_name: &str, call: F) -> ToolResult<T>
where
    F: Future<Output = ToolResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ToolError::LookupUnavailable(format!(
            "{} timed out after {} ms",
            tool_name,
            timeout.as_millis()
        ))),
    }
}
