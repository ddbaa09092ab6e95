//! In-memory stores with the same contracts as the Postgres repositories.
//!
//! Used for dry runs and tests where a database is not available.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BackupJob, Destination, ExecutionLog, ExecutionLogQuery, NewBackupJob, NewDestination,
    NewExecutionLog, NewSource, Source,
};
use crate::repositories::traits::{ConfigStore, ExecutionLogStore};

fn now() -> jiff_diesel::Timestamp {
    jiff_diesel::Timestamp::from(jiff::Timestamp::now())
}

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    next_id: AtomicI32,
    jobs: DashMap<i32, BackupJob>,
    sources: DashMap<i32, Source>,
    destinations: DashMap<i32, Destination>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_source(&self, source: NewSource) -> Source {
        let now = now();
        let row = Source {
            id: self.allocate_id(),
            name: source.name,
            source_type: source.source_type,
            db_engine: source.db_engine,
            db_host: source.db_host,
            db_port: source.db_port,
            db_name: source.db_name,
            db_user: source.db_user,
            db_password_encrypted: source.db_password_encrypted,
            volume_name: source.volume_name,
            created_at: now,
            updated_at: now,
        };
        self.sources.insert(row.id, row.clone());
        row
    }

    pub fn add_destination(&self, destination: NewDestination) -> Destination {
        let now = now();
        let row = Destination {
            id: self.allocate_id(),
            name: destination.name,
            bot_token_encrypted: destination.bot_token_encrypted,
            channel_id_encrypted: destination.channel_id_encrypted,
            created_at: now,
            updated_at: now,
        };
        self.destinations.insert(row.id, row.clone());
        row
    }

    /// Validates like the Postgres repository does.
    pub fn add_job(&self, job: NewBackupJob) -> AppResult<BackupJob> {
        job.validate()?;
        let now = now();
        let row = BackupJob {
            id: self.allocate_id(),
            name: job.name,
            source_id: job.source_id,
            destination_id: job.destination_id,
            cron_expression: job.cron_expression,
            output_format: job.output_format,
            is_active: job.is_active,
            timeout_secs: job.timeout_secs,
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(row.id, row.clone());
        Ok(row)
    }

    /// Store a job row as-is, skipping validation. Lets callers model rows
    /// that were edited directly in the database.
    pub fn put_job(&self, job: BackupJob) {
        self.jobs.insert(job.id, job);
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn list_active_jobs(&self) -> AppResult<Vec<BackupJob>> {
        let mut jobs: Vec<BackupJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.is_active)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn get_job(&self, id: i32) -> AppResult<BackupJob> {
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found("BackupJob", "id", id))
    }

    async fn get_source(&self, id: i32) -> AppResult<Source> {
        self.sources
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found("Source", "id", id))
    }

    async fn get_destination(&self, id: i32) -> AppResult<Destination> {
        self.destinations
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found("Destination", "id", id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryExecutionLogStore {
    next_id: AtomicI64,
    logs: DashMap<i64, ExecutionLog>,
}

impl InMemoryExecutionLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryExecutionLogStore {
    async fn append(&self, log: NewExecutionLog) -> AppResult<ExecutionLog> {
        let row = ExecutionLog {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            job_id: log.job_id,
            started_at: log.started_at,
            finished_at: log.finished_at,
            status: log.status,
            detail: log.detail,
            artifact_size: log.artifact_size,
        };
        self.logs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn query(&self, query: &ExecutionLogQuery) -> AppResult<Vec<ExecutionLog>> {
        let mut rows: Vec<ExecutionLog> = self
            .logs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|log| query.job_id.is_none_or(|id| log.job_id == id))
            .filter(|log| query.status.is_none_or(|status| log.status == status))
            .filter(|log| query.since.is_none_or(|since| log.started_at.to_jiff() >= since))
            .collect();

        rows.sort_by(|a, b| {
            b.started_at
                .to_jiff()
                .cmp(&a.started_at.to_jiff())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(query.limit).unwrap_or(0));
        Ok(rows)
    }
}
