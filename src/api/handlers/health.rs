//! Health check endpoint.
//!
//! Reports database connectivity, whether the due-job scheduler is ticking
//! and which jobs currently hold a run lock.

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus};
use crate::db::AsyncDbPool;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use jiff::Timestamp;
use std::collections::BTreeMap;
use std::time::Instant;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health_check))
}

/// Service health
///
/// A database that cannot be reached makes the service unhealthy; a stopped
/// scheduler only degrades it, since manual runs still work.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();

    let database = match &state.db_pool {
        Some(pool) => check_database(pool).await,
        None => ComponentHealth::new(HealthStatus::Healthy, "In-memory store"),
    };
    checks.insert("database".to_string(), database);

    let scheduler = if state.scheduler.is_running().await {
        ComponentHealth::new(
            HealthStatus::Healthy,
            format!(
                "Ticking in {}",
                state.scheduler.timezone().iana_name().unwrap_or("custom zone")
            ),
        )
    } else {
        ComponentHealth::new(HealthStatus::Degraded, "Not running")
    };
    checks.insert("scheduler".to_string(), scheduler);

    let status = checks
        .values()
        .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

    let mut running_jobs: Vec<i32> = state
        .coordinator
        .locks()
        .running()
        .into_iter()
        .map(|(job_id, _)| job_id)
        .collect();
    running_jobs.sort_unstable();

    let now = Timestamp::now();
    let response = HealthResponse {
        status,
        version: crate::pkg_version().to_string(),
        timestamp: now.to_string(),
        uptime_secs: now.as_second() - state.started_at.as_second(),
        checks,
        running_jobs,
    };

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(response))
}

async fn check_database(pool: &AsyncDbPool) -> ComponentHealth {
    use diesel_async::RunQueryDsl;

    let start = Instant::now();
    let health = match pool.get().await {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn).await {
            Ok(_) => ComponentHealth::new(HealthStatus::Healthy, "Connected"),
            Err(e) => ComponentHealth::new(HealthStatus::Unhealthy, format!("Query failed: {e}")),
        },
        Err(e) => ComponentHealth::new(HealthStatus::Unhealthy, format!("Connection failed: {e}")),
    };
    health.timed(start.elapsed())
}
