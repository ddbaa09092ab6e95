//! Job diagnostics DTOs.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{ExecutionLog, ExecutionLogQuery, LogStatus};

/// Parse an RFC 3339 timestamp passed as `field`.
pub fn parse_timestamp(field: &str, value: &str) -> AppResult<Timestamp> {
    value
        .parse::<Timestamp>()
        .map_err(|e| AppError::validation(field, format!("expected an RFC 3339 timestamp: {e}")))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DueJobsQuery {
    /// Instant to evaluate (RFC 3339). Defaults to now.
    #[param(example = "2024-01-15T02:00:00Z")]
    pub at: Option<String>,
}

impl DueJobsQuery {
    pub fn instant(&self) -> AppResult<Timestamp> {
        match &self.at {
            Some(at) => parse_timestamp("at", at),
            None => Ok(Timestamp::now()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "at": "2024-01-15T02:00:00Z",
    "timezone": "UTC",
    "job_ids": [1, 4]
}))]
pub struct DueJobsResponse {
    #[schema(value_type = String, format = DateTime)]
    pub at: String,
    /// Zone the schedules were evaluated in
    pub timezone: String,
    pub job_ids: Vec<i32>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQueryParams {
    pub status: Option<LogStatus>,
    /// Only runs started at or after this instant (RFC 3339)
    pub since: Option<String>,
    /// Page size, newest first
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    #[param(minimum = 1, maximum = 500, example = 50)]
    pub limit: Option<i64>,
}

impl LogQueryParams {
    pub fn into_query(self, job_id: i32) -> AppResult<ExecutionLogQuery> {
        let defaults = ExecutionLogQuery::for_job(job_id);
        Ok(ExecutionLogQuery {
            status: self.status,
            since: self
                .since
                .as_deref()
                .map(|since| parse_timestamp("since", since))
                .transpose()?,
            limit: self.limit.unwrap_or(defaults.limit),
            ..defaults
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 12,
    "job_id": 3,
    "status": "success",
    "started_at": "2024-01-15T02:00:00Z",
    "finished_at": "2024-01-15T02:00:07Z",
    "duration_ms": 7000,
    "artifact_size": 5242880,
    "detail": "Delivered app_20240115_020000.sql.gz (5.00 MB) in 1 attempt(s)"
}))]
pub struct ExecutionLogResponse {
    pub id: i64,
    pub job_id: i32,
    pub status: LogStatus,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: String,
    #[schema(value_type = String, format = DateTime)]
    pub finished_at: String,
    pub duration_ms: i64,
    pub artifact_size: i64,
    pub detail: String,
}

impl From<ExecutionLog> for ExecutionLogResponse {
    fn from(log: ExecutionLog) -> Self {
        let started = log.started_at.to_jiff();
        let finished = log.finished_at.to_jiff();
        let duration_ms = finished.as_millisecond() - started.as_millisecond();
        Self {
            id: log.id,
            job_id: log.job_id,
            status: log.status,
            started_at: started.to_string(),
            finished_at: finished.to_string(),
            duration_ms,
            artifact_size: log.artifact_size,
            detail: log.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_query_parses_rfc3339() {
        let query = DueJobsQuery {
            at: Some("2024-01-15T03:00:00+01:00".to_string()),
        };
        assert_eq!(
            query.instant().unwrap(),
            "2024-01-15T02:00:00Z".parse::<Timestamp>().unwrap()
        );
    }

    #[test]
    fn test_due_query_rejects_garbage() {
        let query = DueJobsQuery {
            at: Some("yesterday".to_string()),
        };
        assert!(matches!(
            query.instant(),
            Err(AppError::Validation { field, .. }) if field == "at"
        ));
    }

    #[test]
    fn test_log_params_fill_defaults() {
        let query = LogQueryParams::default().into_query(5).unwrap();
        assert_eq!(query, ExecutionLogQuery::for_job(5));

        let query = LogQueryParams {
            status: Some(LogStatus::Failed),
            since: Some("2024-01-01T00:00:00Z".to_string()),
            limit: Some(10),
        }
        .into_query(5)
        .unwrap();
        assert_eq!(query.job_id, Some(5));
        assert_eq!(query.status, Some(LogStatus::Failed));
        assert_eq!(query.limit, 10);
        assert!(query.since.is_some());
    }

    #[test]
    fn test_log_params_limit_is_bounded() {
        let params = LogQueryParams {
            limit: Some(0),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_log_response_reports_duration() {
        let started: Timestamp = "2024-01-15T02:00:00Z".parse().unwrap();
        let finished: Timestamp = "2024-01-15T02:00:07.5Z".parse().unwrap();
        let response = ExecutionLogResponse::from(ExecutionLog {
            id: 1,
            job_id: 2,
            started_at: started.into(),
            finished_at: finished.into(),
            status: LogStatus::Success,
            detail: "ok".to_string(),
            artifact_size: 10,
        });

        assert_eq!(response.duration_ms, 7500);
        assert_eq!(response.started_at, "2024-01-15T02:00:00Z");
    }
}
