//! Repository layer for data access operations.
//!
//! The scheduler and coordinator only see the [`ConfigStore`] and
//! [`ExecutionLogStore`] traits. [`Repositories`] implements them over
//! Postgres; the `memory` module implements them in process.

mod backup_job_repo;
mod destination_repo;
mod execution_log_repo;
mod memory;
mod source_repo;
mod traits;

pub use backup_job_repo::BackupJobRepository;
pub use destination_repo::DestinationRepository;
pub use execution_log_repo::ExecutionLogRepository;
pub use memory::{InMemoryConfigStore, InMemoryExecutionLogStore};
pub use source_repo::SourceRepository;
pub use traits::{ConfigStore, ExecutionLogStore};

use async_trait::async_trait;

use crate::db::AsyncDbPool;
use crate::error::AppResult;
use crate::models::{BackupJob, Destination, Source};

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub jobs: BackupJobRepository,
    pub sources: SourceRepository,
    pub destinations: DestinationRepository,
    pub logs: ExecutionLogRepository,
}

impl Repositories {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            jobs: BackupJobRepository::new(pool.clone()),
            sources: SourceRepository::new(pool.clone()),
            destinations: DestinationRepository::new(pool.clone()),
            logs: ExecutionLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl ConfigStore for Repositories {
    async fn list_active_jobs(&self) -> AppResult<Vec<BackupJob>> {
        self.jobs.list_active().await
    }

    async fn get_job(&self, id: i32) -> AppResult<BackupJob> {
        self.jobs.find_by_id(id).await
    }

    async fn get_source(&self, id: i32) -> AppResult<Source> {
        self.sources.find_by_id(id).await
    }

    async fn get_destination(&self, id: i32) -> AppResult<Destination> {
        self.destinations.find_by_id(id).await
    }
}
