//! Run-job command handler

use std::process::ExitCode;

use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::destinations::message::format_file_size;
use crate::error::AppResult;
use crate::jobs::RunOutcome;
use crate::state::AppState;

pub struct RunJobCommandHandler {
    config: Settings,
}

impl RunJobCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Run the job and print its outcome. A failed run exits with a failure
    /// code; a skipped run does not.
    pub async fn execute(&self, job_id: i32) -> AppResult<ExitCode> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let state = AppState::new(&self.config, pool)?;
        run_and_report(&state, job_id).await
    }
}

pub(crate) async fn run_and_report(state: &AppState, job_id: i32) -> AppResult<ExitCode> {
    let outcome = state.coordinator.run_job_now(job_id).await?;
    println!("{}", describe_outcome(job_id, &outcome));
    Ok(match outcome {
        RunOutcome::Failed { .. } => ExitCode::FAILURE,
        RunOutcome::Success { .. } | RunOutcome::Skipped => ExitCode::SUCCESS,
    })
}

pub(crate) fn describe_outcome(job_id: i32, outcome: &RunOutcome) -> String {
    let log = |log_id: &Option<i64>| match log_id {
        Some(id) => format!("log #{id}"),
        None => "log not written".to_string(),
    };
    match outcome {
        RunOutcome::Success {
            log_id,
            artifact_size,
            detail,
        } => format!(
            "✓ Job {job_id} succeeded ({}, {}): {detail}",
            format_file_size(*artifact_size),
            log(log_id)
        ),
        RunOutcome::Failed { log_id, detail, .. } => {
            format!("✗ Job {job_id} failed ({}): {detail}", log(log_id))
        }
        RunOutcome::Skipped => {
            format!("- Job {job_id} skipped: a run is already in progress or the job is inactive")
        }
    }
}
