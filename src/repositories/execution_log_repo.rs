use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{ExecutionLog, ExecutionLogQuery, NewExecutionLog};
use crate::repositories::traits::ExecutionLogStore;
use crate::schema::execution_logs;

/// Postgres-backed execution log. Only inserts and reads; there is no update
/// or delete path.
#[derive(Clone)]
pub struct ExecutionLogRepository {
    pool: AsyncDbPool,
}

impl ExecutionLogRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionLogStore for ExecutionLogRepository {
    async fn append(&self, log: NewExecutionLog) -> AppResult<ExecutionLog> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(execution_logs::table)
            .values(&log)
            .returning(ExecutionLog::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn query(&self, query: &ExecutionLogQuery) -> AppResult<Vec<ExecutionLog>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let mut statement = execution_logs::table.into_boxed();
        if let Some(job_id) = query.job_id {
            statement = statement.filter(execution_logs::job_id.eq(job_id));
        }
        if let Some(status) = query.status {
            statement = statement.filter(execution_logs::status.eq(status));
        }
        if let Some(since) = query.since {
            statement = statement.filter(execution_logs::started_at.ge(jiff_diesel::Timestamp::from(since)));
        }

        statement
            .order((execution_logs::started_at.desc(), execution_logs::id.desc()))
            .limit(query.limit)
            .select(ExecutionLog::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}
