//! Long-running process: scheduler, worker pool and diagnostics API
//!
//! Startup order is pool, migrations, state, workers, scheduler, API.
//! Shutdown runs the other way round: the API stops accepting requests,
//! the scheduler stops queueing, and the worker pool finishes the runs it
//! already started.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::api::routes::create_router;
use crate::config::{Environment, settings::Settings};
use crate::db::{establish_async_connection_pool, run_pending_migrations};
use crate::error::{AppError, AppResult};
use crate::jobs::{RunQueue, WorkerPool};
use crate::state::AppState;

pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start everything and run until Ctrl+C or SIGTERM.
    pub async fn run(self) -> AppResult<()> {
        self.log_configuration();

        tracing::info!("Initializing database connection pool...");
        let pool = establish_async_connection_pool(&self.settings.database).await?;
        tracing::info!("Database connection pool initialized");

        if self.settings.database.auto_migrate {
            let applied = run_pending_migrations(&self.settings.database.url).await?;
            tracing::info!(count = applied.len(), "Pending migrations applied");
        }

        let state = AppState::new(&self.settings, pool)?;
        tracing::info!("Application state created");

        let scheduler_config = &self.settings.scheduler;
        let (queue, receiver) = RunQueue::channel(scheduler_config.queue_capacity);
        let shutdown = CancellationToken::new();
        let workers = WorkerPool::new(state.coordinator.clone(), scheduler_config.worker_pool_size)
            .spawn(receiver, shutdown.clone());

        if scheduler_config.enabled {
            state
                .scheduler
                .start(queue, Duration::from_secs(scheduler_config.tick_interval_secs))
                .await?;
        } else {
            tracing::warn!("Scheduler disabled; jobs only run when triggered manually");
            drop(queue);
        }

        let served = if self.settings.server.enabled {
            self.serve_api(state.clone()).await
        } else {
            shutdown_signal().await;
            Ok(())
        };

        tracing::info!("Stopping scheduler and waiting for running jobs");
        if let Err(e) = state.scheduler.stop().await {
            tracing::error!(error = %e, "Failed to stop scheduler");
        }
        shutdown.cancel();
        if let Err(e) = workers.await {
            tracing::error!(error = %e, "Worker pool terminated abnormally");
        }

        tracing::info!("Shutdown complete");
        served
    }

    async fn serve_api(&self, state: AppState) -> AppResult<()> {
        let router = create_router(state, Duration::from_secs(self.settings.server.request_timeout));

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            AppError::Configuration {
                key: "server.port".to_string(),
                source: anyhow::anyhow!("failed to bind to {}: {}", address, e),
            }
        })?;
        tracing::info!(address = %address, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server stopped accepting requests");
        Ok(())
    }

    fn log_configuration(&self) {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        tracing::info!(
            enabled = self.settings.server.enabled,
            host = %self.settings.server.host,
            port = self.settings.server.port,
            request_timeout = self.settings.server.request_timeout,
            "Server configuration loaded"
        );

        // The URL carries credentials and is never logged
        tracing::info!(
            max_connections = self.settings.database.max_connections,
            min_connections = self.settings.database.min_connections,
            connection_timeout = self.settings.database.connection_timeout,
            auto_migrate = self.settings.database.auto_migrate,
            "Database configuration loaded"
        );

        tracing::info!(
            enabled = self.settings.scheduler.enabled,
            timezone = %self.settings.scheduler.timezone,
            tick_interval_secs = self.settings.scheduler.tick_interval_secs,
            workers = self.settings.scheduler.worker_pool_size,
            queue_capacity = self.settings.scheduler.queue_capacity,
            job_timeout_secs = self.settings.scheduler.job_timeout_secs,
            "Scheduler configuration loaded"
        );

        tracing::info!(
            max_attempts = self.settings.delivery.retry.max_attempts,
            max_artifact_bytes = self.settings.delivery.max_artifact_bytes,
            notify_on_failure = self.settings.delivery.notify_on_failure,
            key_configured = !self.settings.vault.encryption_key.is_empty(),
            "Delivery configuration loaded"
        );
    }
}

/// Wait for Ctrl+C or SIGTERM. A handler that cannot be installed is logged
/// and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
