//! Per-job mutual exclusion.
//!
//! At most one run per job id at a time within this process. The lock is held
//! by a guard and released when the guard drops, whichever way the run ends.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use jiff::Timestamp;

#[derive(Debug, Clone, Default)]
pub struct JobLockTable {
    held: Arc<DashMap<i32, Timestamp>>,
}

impl JobLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `job_id`, or `None` if a run already holds it.
    pub fn try_acquire(&self, job_id: i32) -> Option<JobLockGuard> {
        match self.held.entry(job_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Timestamp::now());
                Some(JobLockGuard {
                    job_id,
                    held: Arc::clone(&self.held),
                })
            }
        }
    }

    pub fn is_locked(&self, job_id: i32) -> bool {
        self.held.contains_key(&job_id)
    }

    /// Jobs currently running, with the time their lock was taken.
    pub fn running(&self) -> Vec<(i32, Timestamp)> {
        let mut running: Vec<_> = self
            .held
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        running.sort_by_key(|(job_id, _)| *job_id);
        running
    }
}

#[derive(Debug)]
pub struct JobLockGuard {
    job_id: i32,
    held: Arc<DashMap<i32, Timestamp>>,
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.job_id);
    }
}
