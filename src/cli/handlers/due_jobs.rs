//! Due-jobs command handler

use std::sync::Arc;

use jiff::Timestamp;

use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::error::AppResult;
use crate::jobs::DueJobScheduler;
use crate::repositories::{ConfigStore, Repositories};

pub struct DueJobsCommandHandler {
    config: Settings,
}

impl DueJobsCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, at: Option<Timestamp>) -> AppResult<()> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let store: Arc<dyn ConfigStore> = Arc::new(Repositories::new(pool));
        let scheduler = DueJobScheduler::from_config(Arc::clone(&store), &self.config.scheduler)?;

        for line in due_report(&scheduler, store.as_ref(), at.unwrap_or_else(Timestamp::now)).await? {
            println!("{line}");
        }
        Ok(())
    }
}

pub(crate) async fn due_report(
    scheduler: &DueJobScheduler,
    store: &dyn ConfigStore,
    at: Timestamp,
) -> AppResult<Vec<String>> {
    let local = at.to_zoned(scheduler.timezone().clone());
    let due = scheduler.due_jobs_at(at).await?;

    let mut lines = vec![format!(
        "Jobs due at {} ({}): {}",
        at,
        local.strftime("%Y-%m-%d %H:%M %Z"),
        due.len()
    )];
    for job_id in due {
        let job = store.get_job(job_id).await?;
        lines.push(format!(
            "  #{} {} [{}] {}",
            job.id,
            job.name,
            job.cron_expression,
            job.output_format.as_str()
        ));
    }
    Ok(lines)
}
