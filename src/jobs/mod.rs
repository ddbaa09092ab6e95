//! Scheduling and execution of backup jobs.
//!
//! [`DueJobScheduler`] decides which jobs are due and queues them;
//! [`WorkerPool`] drains the queue into the [`ExecutionCoordinator`], which
//! runs one job end to end under its per-job lock.

pub mod coordinator;
pub mod cron;
pub mod error;
pub mod lock;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{CoordinatorSettings, ExecutionCoordinator, RunOutcome};
pub use cron::{CronError, CronSchedule};
pub use error::{RunFailure, RunStage};
pub use lock::{JobLockGuard, JobLockTable};
pub use scheduler::{DueJobScheduler, upcoming_runs};
pub use worker::{RunQueue, RunRequest, WorkerPool};
