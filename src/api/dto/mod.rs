//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `error` - Common error response DTOs
//! - `health` - Health check DTOs
//! - `job` - Due-job and execution log DTOs

mod error;
mod health;
mod job;

pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use job::{
    DueJobsQuery, DueJobsResponse, ExecutionLogResponse, LogQueryParams, parse_timestamp,
};
