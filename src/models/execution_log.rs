//! Append-only record of backup run attempts.

use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, ToSchema)]
#[db_enum(existing_type_path = "crate::schema::sql_types::LogStatus")]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Success => write!(f, "success"),
            LogStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::execution_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ExecutionLog {
    pub id: i64,
    pub job_id: i32,
    pub started_at: jiff_diesel::Timestamp,
    pub finished_at: jiff_diesel::Timestamp,
    pub status: LogStatus,
    pub detail: String,
    pub artifact_size: i64,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::execution_logs)]
pub struct NewExecutionLog {
    pub job_id: i32,
    pub started_at: jiff_diesel::Timestamp,
    pub finished_at: jiff_diesel::Timestamp,
    pub status: LogStatus,
    pub detail: String,
    pub artifact_size: i64,
}

impl NewExecutionLog {
    pub fn success(
        job_id: i32,
        started_at: jiff::Timestamp,
        finished_at: jiff::Timestamp,
        detail: impl Into<String>,
        artifact_size: u64,
    ) -> Self {
        Self::new(job_id, started_at, finished_at, LogStatus::Success, detail, artifact_size)
    }

    pub fn failed(
        job_id: i32,
        started_at: jiff::Timestamp,
        finished_at: jiff::Timestamp,
        detail: impl Into<String>,
        artifact_size: u64,
    ) -> Self {
        Self::new(job_id, started_at, finished_at, LogStatus::Failed, detail, artifact_size)
    }

    fn new(
        job_id: i32,
        started_at: jiff::Timestamp,
        finished_at: jiff::Timestamp,
        status: LogStatus,
        detail: impl Into<String>,
        artifact_size: u64,
    ) -> Self {
        Self {
            job_id,
            started_at: started_at.into(),
            finished_at: finished_at.into(),
            status,
            detail: detail.into(),
            artifact_size: i64::try_from(artifact_size).unwrap_or(i64::MAX),
        }
    }
}

/// Filters for reading the log back. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLogQuery {
    pub job_id: Option<i32>,
    pub status: Option<LogStatus>,
    pub since: Option<jiff::Timestamp>,
    pub limit: i64,
}

impl Default for ExecutionLogQuery {
    fn default() -> Self {
        Self {
            job_id: None,
            status: None,
            since: None,
            limit: 50,
        }
    }
}

impl ExecutionLogQuery {
    pub fn for_job(job_id: i32) -> Self {
        Self {
            job_id: Some(job_id),
            ..Default::default()
        }
    }
}
