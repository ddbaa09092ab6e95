use std::sync::Arc;
use std::time::Duration;

use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use super::cron::{CronError, CronSchedule};
use super::worker::{RunQueue, RunRequest};
use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::repositories::ConfigStore;

/// Fires once per minute boundary.
const MINUTE_TICK: &str = "0 * * * * *";

/// Evaluates job schedules and feeds due jobs into the run queue.
///
/// The tick itself is driven by tokio-cron-scheduler; matching uses the
/// five-field [`CronSchedule`] in the configured time zone.
pub struct DueJobScheduler {
    store: Arc<dyn ConfigStore>,
    timezone: TimeZone,
    scheduler: Mutex<Option<TokioCronScheduler>>,
    /// Minute (seconds since the epoch / 60) of the last dispatching tick
    last_dispatched: Mutex<Option<i64>>,
}

impl DueJobScheduler {
    pub fn new(store: Arc<dyn ConfigStore>, timezone: TimeZone) -> Self {
        Self {
            store,
            timezone,
            scheduler: Mutex::new(None),
            last_dispatched: Mutex::new(None),
        }
    }

    pub fn from_config(store: Arc<dyn ConfigStore>, config: &SchedulerConfig) -> AppResult<Self> {
        let timezone = TimeZone::get(&config.timezone).map_err(|e| AppError::Configuration {
            key: "scheduler.timezone".to_string(),
            source: anyhow::Error::from(e),
        })?;
        Ok(Self::new(store, timezone))
    }

    pub fn timezone(&self) -> &TimeZone {
        &self.timezone
    }

    /// Ids of the active jobs whose schedule matches the minute containing `at`.
    ///
    /// Has no side effects. A job whose stored expression does not parse is
    /// skipped with a warning.
    pub async fn due_jobs_at(&self, at: Timestamp) -> AppResult<Vec<i32>> {
        let local = at.to_zoned(self.timezone.clone()).datetime();
        let jobs = self.store.list_active_jobs().await?;

        let mut due = Vec::new();
        for job in jobs {
            match CronSchedule::parse(&job.cron_expression) {
                Ok(schedule) if schedule.matches(local) => due.push(job.id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        job_id = job.id,
                        cron = %job.cron_expression,
                        error = %e,
                        "Skipping job with invalid cron expression"
                    );
                }
            }
        }
        Ok(due)
    }

    /// Queue one run request per due job. Returns how many were queued.
    ///
    /// Each minute is dispatched at most once: later ticks falling into an
    /// already dispatched (or earlier) minute queue nothing.
    pub async fn tick(&self, queue: &RunQueue, at: Timestamp) -> AppResult<usize> {
        let minute = at.as_second().div_euclid(60);
        let mut last = self.last_dispatched.lock().await;
        if last.is_some_and(|previous| minute <= previous) {
            tracing::debug!(at = %at, "Minute already dispatched, tick skipped");
            return Ok(0);
        }

        let due = self.due_jobs_at(at).await?;
        *last = Some(minute);
        drop(last);

        let queued = due
            .iter()
            .filter(|job_id| {
                queue.enqueue(RunRequest {
                    job_id: **job_id,
                    triggered_at: at,
                })
            })
            .count();

        tracing::debug!(due = due.len(), queued, at = %at, "Scheduler tick");
        Ok(queued)
    }

    /// Start ticking. A 60 second interval ticks on minute boundaries; any
    /// other interval repeats from the moment of start.
    pub async fn start(self: &Arc<Self>, queue: RunQueue, tick_interval: Duration) -> AppResult<()> {
        let mut guard = self.scheduler.lock().await;
        if guard.is_some() {
            return Err(AppError::Conflict {
                message: "scheduler is already running".to_string(),
            });
        }

        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        let this = Arc::clone(self);
        let on_tick = move |_uuid: uuid::Uuid, _lock: TokioCronScheduler| {
            let this = Arc::clone(&this);
            let queue = queue.clone();
            Box::pin(async move {
                if let Err(e) = this.tick(&queue, Timestamp::now()).await {
                    tracing::error!(error = %e, "Scheduler tick failed");
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        let tick_job = if tick_interval == Duration::from_secs(60) {
            Job::new_async(MINUTE_TICK, on_tick)
        } else {
            Job::new_repeated_async(tick_interval, on_tick)
        }
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        scheduler
            .add(tick_job)
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;
        scheduler.start().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!(
            tick_interval_secs = tick_interval.as_secs(),
            timezone = self.timezone.iana_name().unwrap_or("custom"),
            "Due-job scheduler started"
        );
        *guard = Some(scheduler);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Stop ticking. Runs already queued are left to the worker pool.
    pub async fn stop(&self) -> AppResult<()> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        scheduler.shutdown().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;
        tracing::info!("Due-job scheduler stopped");
        Ok(())
    }
}

/// The next `count` firing times of `cron` after `from`, in `from`'s zone.
pub fn upcoming_runs(cron: &str, from: &Zoned, count: usize) -> Result<Vec<Zoned>, CronError> {
    let schedule = CronSchedule::parse(cron)?;
    Ok(schedule
        .upcoming(from.datetime(), count)
        .into_iter()
        .filter_map(|at| at.to_zoned(from.time_zone().clone()).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBackupJob, OutputFormat};
    use crate::repositories::InMemoryConfigStore;
    use jiff::civil::date;

    fn new_job(name: &str, cron: &str, active: bool) -> NewBackupJob {
        NewBackupJob {
            name: name.to_string(),
            source_id: 1,
            destination_id: 1,
            cron_expression: cron.to_string(),
            output_format: OutputFormat::CompressedArchive,
            is_active: active,
            timeout_secs: None,
        }
    }

    fn utc(y: i16, m: i8, d: i8, h: i8, min: i8) -> Timestamp {
        date(y, m, d).at(h, min, 0, 0).in_tz("UTC").unwrap().timestamp()
    }

    #[tokio::test]
    async fn test_due_jobs_match_the_minute() {
        let store = Arc::new(InMemoryConfigStore::new());
        let nightly = store.add_job(new_job("nightly", "0 2 * * *", true)).unwrap();
        let frequent = store.add_job(new_job("frequent", "*/6 * * * *", true)).unwrap();
        let weekdays = store.add_job(new_job("weekdays", "30 3 * * 1-5", true)).unwrap();
        store.add_job(new_job("paused", "* * * * *", false)).unwrap();

        let scheduler = DueJobScheduler::new(store, TimeZone::UTC);

        // 2024-01-15 is a Monday
        assert_eq!(
            scheduler.due_jobs_at(utc(2024, 1, 15, 2, 0)).await.unwrap(),
            vec![nightly.id, frequent.id]
        );
        assert_eq!(
            scheduler.due_jobs_at(utc(2024, 1, 15, 2, 1)).await.unwrap(),
            Vec::<i32>::new()
        );
        // */6 also covers minute 30
        assert_eq!(
            scheduler.due_jobs_at(utc(2024, 1, 15, 3, 30)).await.unwrap(),
            vec![frequent.id, weekdays.id]
        );
        // Saturday
        assert!(scheduler.due_jobs_at(utc(2024, 1, 20, 3, 30)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seconds_within_the_minute_still_match() {
        let store = Arc::new(InMemoryConfigStore::new());
        let job = store.add_job(new_job("nightly", "0 2 * * *", true)).unwrap();
        let scheduler = DueJobScheduler::new(store, TimeZone::UTC);

        let at = date(2024, 1, 15).at(2, 0, 42, 0).in_tz("UTC").unwrap().timestamp();
        assert_eq!(scheduler.due_jobs_at(at).await.unwrap(), vec![job.id]);
    }

    #[tokio::test]
    async fn test_schedules_are_evaluated_in_configured_zone() {
        let store = Arc::new(InMemoryConfigStore::new());
        let job = store.add_job(new_job("nightly", "0 2 * * *", true)).unwrap();
        let scheduler = DueJobScheduler::new(store, TimeZone::get("Asia/Shanghai").unwrap());

        // 02:00 in Shanghai is 18:00 UTC the day before
        assert_eq!(
            scheduler.due_jobs_at(utc(2024, 1, 14, 18, 0)).await.unwrap(),
            vec![job.id]
        );
        assert!(scheduler.due_jobs_at(utc(2024, 1, 15, 2, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_stored_cron_is_skipped() {
        let store = Arc::new(InMemoryConfigStore::new());
        let mut broken = store.add_job(new_job("broken", "0 2 * * *", true)).unwrap();
        broken.cron_expression = "not a cron".to_string();
        store.put_job(broken);
        let healthy = store.add_job(new_job("healthy", "0 2 * * *", true)).unwrap();

        let scheduler = DueJobScheduler::new(store, TimeZone::UTC);
        assert_eq!(
            scheduler.due_jobs_at(utc(2024, 1, 15, 2, 0)).await.unwrap(),
            vec![healthy.id]
        );
    }

    #[tokio::test]
    async fn test_tick_queues_due_jobs_and_drops_overflow() {
        let store = Arc::new(InMemoryConfigStore::new());
        for name in ["a", "b", "c"] {
            store.add_job(new_job(name, "0 2 * * *", true)).unwrap();
        }
        let scheduler = DueJobScheduler::new(store, TimeZone::UTC);
        let (queue, mut receiver) = RunQueue::channel(2);
        let at = utc(2024, 1, 15, 2, 0);

        assert_eq!(scheduler.tick(&queue, at).await.unwrap(), 2);
        let first = receiver.recv().await.unwrap();
        assert_eq!(first.triggered_at, at);
        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tick_dispatches_each_minute_once() {
        let store = Arc::new(InMemoryConfigStore::new());
        store.add_job(new_job("always", "* * * * *", true)).unwrap();
        let scheduler = DueJobScheduler::new(store, TimeZone::UTC);
        let (queue, mut receiver) = RunQueue::channel(16);

        let at = |second| date(2024, 1, 15).at(2, 0, second, 0).in_tz("UTC").unwrap().timestamp();
        assert_eq!(scheduler.tick(&queue, at(0)).await.unwrap(), 1);
        assert_eq!(scheduler.tick(&queue, at(30)).await.unwrap(), 0);
        assert_eq!(scheduler.tick(&queue, at(59)).await.unwrap(), 0);
        assert_eq!(scheduler.tick(&queue, utc(2024, 1, 15, 2, 1)).await.unwrap(), 1);

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_started_scheduler_feeds_the_queue() {
        let store = Arc::new(InMemoryConfigStore::new());
        let job = store.add_job(new_job("always", "* * * * *", true)).unwrap();
        let scheduler = Arc::new(DueJobScheduler::new(store, TimeZone::UTC));
        let (queue, mut receiver) = RunQueue::channel(16);

        scheduler.start(queue.clone(), Duration::from_secs(1)).await.unwrap();
        assert!(scheduler.start(queue, Duration::from_secs(1)).await.is_err());

        let request = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.job_id, job.id);
        assert!(scheduler.is_running().await);

        scheduler.stop().await.unwrap();
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
    }

    #[test]
    fn test_upcoming_runs_in_zone() {
        let from = date(2024, 1, 15).at(1, 30, 0, 0).in_tz("Asia/Shanghai").unwrap();
        let runs = upcoming_runs("0 2 * * *", &from, 3).unwrap();

        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].datetime(), date(2024, 1, 15).at(2, 0, 0, 0));
        assert_eq!(runs[2].datetime(), date(2024, 1, 17).at(2, 0, 0, 0));
        assert_eq!(runs[0].time_zone().iana_name(), Some("Asia/Shanghai"));

        assert!(upcoming_runs("0 2 * *", &from, 3).is_err());
    }
}
