use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{BackupJob, Destination, ExecutionLog, ExecutionLogQuery, NewExecutionLog, Source};

/// Read side of the configuration store: jobs, sources and destinations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Active jobs only; inactive jobs are never scheduled.
    async fn list_active_jobs(&self) -> AppResult<Vec<BackupJob>>;

    async fn get_job(&self, id: i32) -> AppResult<BackupJob>;

    async fn get_source(&self, id: i32) -> AppResult<Source>;

    async fn get_destination(&self, id: i32) -> AppResult<Destination>;
}

/// Insert-only store of run attempts. Entries are never updated or deleted.
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn append(&self, log: NewExecutionLog) -> AppResult<ExecutionLog>;

    async fn query(&self, query: &ExecutionLogQuery) -> AppResult<Vec<ExecutionLog>>;
}
