//! Job request handlers: manual runs, due-job diagnostics and execution logs.

use crate::api::doc::JOB_TAG;
use crate::api::dto::{
    DueJobsQuery, DueJobsResponse, ErrorResponse, ExecutionLogResponse, LogQueryParams,
};
use crate::error::{AppError, AppResult};
use crate::jobs::RunOutcome;
use crate::state::AppState;
use crate::utils::validate::ValidatedQuery;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(run_job))
        .routes(routes!(due_jobs))
        .routes(routes!(job_logs))
}

/// Run a job now
///
/// Goes through the same lock, timeout and logging as a scheduled run. The
/// run continues in the background if the client disconnects or the request
/// times out; its result still lands in the execution log.
#[utoipa::path(
    post,
    path = "/{id}/run",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Run finished or was skipped", body = RunOutcome),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
async fn run_job(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<RunOutcome>> {
    let coordinator = state.coordinator.clone();
    let outcome = tokio::spawn(async move { coordinator.run_job_now(id).await })
        .await
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })??;
    Ok(Json(outcome))
}

/// Jobs due at an instant
///
/// Evaluates every active job's schedule for the minute containing `at`
/// without running anything.
#[utoipa::path(
    get,
    path = "/due",
    tag = JOB_TAG,
    params(DueJobsQuery),
    responses(
        (status = 200, description = "Ids of the due jobs", body = DueJobsResponse),
        (status = 400, description = "Malformed timestamp", body = ErrorResponse)
    )
)]
async fn due_jobs(
    State(state): State<AppState>,
    Query(query): Query<DueJobsQuery>,
) -> AppResult<Json<DueJobsResponse>> {
    let at = query.instant()?;
    let job_ids = state.scheduler.due_jobs_at(at).await?;
    Ok(Json(DueJobsResponse {
        at: at.to_string(),
        timezone: state
            .scheduler
            .timezone()
            .iana_name()
            .unwrap_or("custom")
            .to_string(),
        job_ids,
    }))
}

/// Execution log of a job, newest first
#[utoipa::path(
    get,
    path = "/{id}/logs",
    tag = JOB_TAG,
    params(
        ("id" = i32, Path, description = "Job ID"),
        LogQueryParams
    ),
    responses(
        (status = 200, description = "Execution log entries", body = Vec<ExecutionLogResponse>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
async fn job_logs(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidatedQuery(params): ValidatedQuery<LogQueryParams>,
) -> AppResult<Json<Vec<ExecutionLogResponse>>> {
    state.store.get_job(id).await?;
    let logs = state.logs.query(&params.into_query(id)?).await?;
    Ok(Json(logs.into_iter().map(ExecutionLogResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DbEngine, LogStatus, NewBackupJob, NewDestination, NewExecutionLog, NewSource, OutputFormat,
    };
    use crate::state::testing::{TestState, test_state};
    use jiff::{Timestamp, ToSpan};

    fn sqlite_job(test: &TestState, dir: &tempfile::TempDir, cron: &str) -> i32 {
        let db_path = dir.path().join("app.db");
        std::fs::write(&db_path, b"sqlite bytes").unwrap();
        let source = test.store.add_source(NewSource::database(
            "app",
            DbEngine::Sqlite,
            db_path.to_string_lossy().as_ref(),
        ));
        let destination = test.store.add_destination(NewDestination {
            name: "ops".to_string(),
            bot_token_encrypted: test.state.vault.encrypt("1:token").unwrap(),
            channel_id_encrypted: test.state.vault.encrypt("-100").unwrap(),
        });
        test.store
            .add_job(NewBackupJob {
                name: "app-nightly".to_string(),
                source_id: source.id,
                destination_id: destination.id,
                cron_expression: cron.to_string(),
                output_format: OutputFormat::RawDump,
                is_active: true,
                timeout_secs: None,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_run_job_delivers_and_logs() {
        let test = test_state();
        let dir = tempfile::tempdir().unwrap();
        let id = sqlite_job(&test, &dir, "0 2 * * *");

        let Json(outcome) = run_job(State(test.state.clone()), Path(id)).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Success { .. }));
        assert_eq!(test.transport.documents().len(), 1);
        assert_eq!(test.logs.len(), 1);
    }

    #[tokio::test]
    async fn test_run_unknown_job_is_not_found() {
        let test = test_state();
        let result = run_job(State(test.state), Path(404)).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_due_jobs_at_instant() {
        let test = test_state();
        let dir = tempfile::tempdir().unwrap();
        let id = sqlite_job(&test, &dir, "0 2 * * *");

        let query = DueJobsQuery {
            at: Some("2024-01-15T02:00:30Z".to_string()),
        };
        let Json(due) = due_jobs(State(test.state.clone()), Query(query)).await.unwrap();
        assert_eq!(due.job_ids, vec![id]);
        assert_eq!(due.timezone, "UTC");
        assert_eq!(due.at, "2024-01-15T02:00:30Z");

        let query = DueJobsQuery {
            at: Some("2024-01-15T02:01:00Z".to_string()),
        };
        let Json(due) = due_jobs(State(test.state), Query(query)).await.unwrap();
        assert!(due.job_ids.is_empty());
    }

    #[tokio::test]
    async fn test_job_logs_are_filtered() {
        let test = test_state();
        let dir = tempfile::tempdir().unwrap();
        let id = sqlite_job(&test, &dir, "0 2 * * *");

        let start = Timestamp::now() - 10.minutes();
        test.state
            .logs
            .append(NewExecutionLog::success(id, start, start + 5.seconds(), "ok", 12))
            .await
            .unwrap();
        test.state
            .logs
            .append(NewExecutionLog::failed(id, start + 1.minute(), start + 2.minutes(), "bad", 0))
            .await
            .unwrap();

        let Json(all) = job_logs(
            State(test.state.clone()),
            Path(id),
            ValidatedQuery(LogQueryParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, LogStatus::Failed);

        let Json(successes) = job_logs(
            State(test.state.clone()),
            Path(id),
            ValidatedQuery(LogQueryParams {
                status: Some(LogStatus::Success),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].duration_ms, 5000);

        let missing = job_logs(
            State(test.state),
            Path(id + 1),
            ValidatedQuery(LogQueryParams::default()),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }
}
