//! Bounded run queue and the worker pool that drains it.
//!
//! The scheduler only enqueues; it never waits for a backup. Workers take
//! requests off the queue while holding a pool permit, so at most
//! `worker_pool_size` runs are in flight. A full queue drops the trigger.

use std::sync::Arc;

use jiff::Timestamp;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::coordinator::ExecutionCoordinator;

/// One trigger for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub job_id: i32,
    pub triggered_at: Timestamp,
}

impl RunRequest {
    pub fn now(job_id: i32) -> Self {
        Self {
            job_id,
            triggered_at: Timestamp::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunQueue {
    sender: mpsc::Sender<RunRequest>,
}

impl RunQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RunRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a request without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, request: RunRequest) -> bool {
        match self.sender.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    job_id = dropped.job_id,
                    triggered_at = %dropped.triggered_at,
                    "Run queue is full, trigger dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                tracing::warn!(job_id = dropped.job_id, "Run queue is closed, trigger dropped");
                false
            }
        }
    }
}

pub struct WorkerPool {
    coordinator: Arc<ExecutionCoordinator>,
    size: usize,
}

impl WorkerPool {
    pub fn new(coordinator: Arc<ExecutionCoordinator>, size: usize) -> Self {
        Self {
            coordinator,
            size: size.max(1),
        }
    }

    pub fn spawn(self, receiver: mpsc::Receiver<RunRequest>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver, shutdown))
    }

    /// Process requests until the queue closes or `shutdown` fires, then wait
    /// for in-flight runs. Requests still queued at shutdown are discarded.
    pub async fn run(self, mut receiver: mpsc::Receiver<RunRequest>, shutdown: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.size));
        let mut running = JoinSet::new();
        tracing::info!(workers = self.size, "Worker pool started");

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let request = tokio::select! {
                _ = shutdown.cancelled() => break,
                request = receiver.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let coordinator = Arc::clone(&self.coordinator);
            running.spawn(async move {
                let _permit = permit;
                let job_id = request.job_id;
                let outcome = coordinator.handle(request).await;
                tracing::debug!(job_id, ?outcome, "Worker finished run");
            });

            while let Some(finished) = running.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Worker task panicked");
                }
            }
        }

        receiver.close();
        let mut discarded = 0usize;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }
        tracing::info!(in_flight = running.len(), discarded, "Worker pool draining");

        while let Some(finished) = running.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}
