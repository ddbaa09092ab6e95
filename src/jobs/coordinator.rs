//! Execution coordinator: runs one backup job from lock to log.
//!
//! `Locking → Extracting → Delivering → Logging`. Every run that gets past the
//! lock writes exactly one execution log, whatever happens in between. The
//! workspace directory, the decrypted credentials and the lock guard are all
//! owned by the run and released when it ends, including on timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use jiff::Timestamp;
use jiff::tz::TimeZone;
use serde::Serialize;
use tracing::Instrument;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use super::error::{RunFailure, RunStage};
use super::lock::JobLockTable;
use super::worker::RunRequest;
use crate::config::Settings;
use crate::destinations::{DeliveryError, DestinationCredentials, DestinationDelivery, message};
use crate::error::{AppError, AppResult};
use crate::models::{BackupJob, Destination, NewExecutionLog, OutputFormat, SourceKind, SourceSpec};
use crate::repositories::{ConfigStore, ExecutionLogStore};
use crate::sources::{Artifact, SourceAdapter};
use crate::vault::CredentialVault;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Hard limit for a run when the job sets none
    pub default_timeout: Duration,
    /// Zone for artifact names and message timestamps
    pub timezone: TimeZone,
    /// Parent of per-run workspaces; the system temp dir when unset
    pub work_dir: Option<PathBuf>,
    pub notify_on_failure: bool,
}

impl CoordinatorSettings {
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let timezone = TimeZone::get(&settings.scheduler.timezone).map_err(|e| {
            AppError::Configuration {
                key: "scheduler.timezone".to_string(),
                source: anyhow::Error::from(e),
            }
        })?;

        Ok(Self {
            default_timeout: Duration::from_secs(settings.scheduler.job_timeout_secs),
            timezone,
            work_dir: settings.sources.work_dir.as_ref().map(PathBuf::from),
            notify_on_failure: settings.delivery.notify_on_failure,
        })
    }
}

/// How a trigger ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success {
        /// `None` when the execution log could not be written
        log_id: Option<i64>,
        artifact_size: u64,
        detail: String,
    },
    Failed {
        log_id: Option<i64>,
        artifact_size: u64,
        detail: String,
    },
    /// Another run of the same job was in progress; nothing was logged
    Skipped,
}

struct StageCell(AtomicU8);

impl StageCell {
    fn new(stage: RunStage) -> Self {
        Self(AtomicU8::new(stage as u8))
    }

    fn set(&self, stage: RunStage) {
        self.0.store(stage as u8, Ordering::SeqCst);
    }

    fn get(&self) -> RunStage {
        RunStage::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// What a run has learned so far, kept outside the timed future so it
/// survives a timeout.
#[derive(Debug, Default)]
struct RunProgress {
    artifact_size: Option<u64>,
    notes: Vec<String>,
}

struct RunSuccess {
    artifact: Artifact,
    attempts: u32,
}

pub struct ExecutionCoordinator {
    store: Arc<dyn ConfigStore>,
    logs: Arc<dyn ExecutionLogStore>,
    vault: CredentialVault,
    sources: SourceAdapter,
    delivery: DestinationDelivery,
    locks: JobLockTable,
    settings: CoordinatorSettings,
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("sources", &self.sources)
            .field("delivery", &self.delivery)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        logs: Arc<dyn ExecutionLogStore>,
        vault: CredentialVault,
        sources: SourceAdapter,
        delivery: DestinationDelivery,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            store,
            logs,
            vault,
            sources,
            delivery,
            locks: JobLockTable::new(),
            settings,
        }
    }

    pub fn locks(&self) -> &JobLockTable {
        &self.locks
    }

    /// Run a job immediately, with the same semantics as a scheduled trigger.
    ///
    /// Errors only when the job itself cannot be loaded; every other failure
    /// is reported through [`RunOutcome::Failed`] and the execution log.
    pub async fn run_job_now(&self, job_id: i32) -> AppResult<RunOutcome> {
        let job = self.store.get_job(job_id).await?;
        tracing::info!(job_id, "Manual run requested");
        Ok(self.run(&job).await)
    }

    /// Entry point for queued scheduler triggers.
    pub async fn handle(&self, request: RunRequest) -> RunOutcome {
        match self.store.get_job(request.job_id).await {
            Ok(job) if job.is_active => self.run(&job).await,
            Ok(_) => {
                tracing::info!(job_id = request.job_id, "Job was deactivated after it was queued");
                RunOutcome::Skipped
            }
            Err(e) => {
                tracing::error!(job_id = request.job_id, error = %e, "Could not load queued job");
                RunOutcome::Failed {
                    log_id: None,
                    artifact_size: 0,
                    detail: e.to_string(),
                }
            }
        }
    }

    pub async fn run(&self, job: &BackupJob) -> RunOutcome {
        let Some(_lock) = self.locks.try_acquire(job.id) else {
            tracing::info!(job_id = job.id, "Job is already running, trigger skipped");
            return RunOutcome::Skipped;
        };

        let span = tracing::info_span!("backup_run", job_id = job.id, job = %job.name);
        self.run_locked(job).instrument(span).await
    }

    async fn run_locked(&self, job: &BackupJob) -> RunOutcome {
        let started_at = Timestamp::now();
        let timeout = job.timeout().unwrap_or(self.settings.default_timeout);
        let stage = StageCell::new(RunStage::Extracting);
        let mut progress = RunProgress::default();
        tracing::info!(timeout_secs = timeout.as_secs(), "Backup run started");

        let result = match tokio::time::timeout(timeout, self.execute(job, &stage, &mut progress)).await {
            Ok(result) => result,
            Err(_) => Err(RunFailure::Timeout {
                seconds: timeout.as_secs(),
                stage: stage.get(),
            }),
        };

        stage.set(RunStage::Logging);
        let finished_at = Timestamp::now();
        let notes = progress.notes.join("; ");
        let with_notes = |detail: String| {
            if notes.is_empty() {
                detail
            } else {
                format!("{detail}; {notes}")
            }
        };

        match result {
            Ok(success) => {
                let detail = with_notes(format!(
                    "Delivered {} ({}) in {} attempt(s), sha256 {}",
                    success.artifact.file_name,
                    message::format_file_size(success.artifact.size),
                    success.attempts,
                    success.artifact.checksum
                ));
                let size = success.artifact.size;
                let log_id = self
                    .record(NewExecutionLog::success(job.id, started_at, finished_at, &detail, size))
                    .await;
                tracing::info!(artifact_size = size, "Backup run succeeded");
                RunOutcome::Success {
                    log_id,
                    artifact_size: size,
                    detail,
                }
            }
            Err(failure) => {
                let detail = with_notes(failure.to_string());
                let size = progress.artifact_size.unwrap_or(0);
                let log_id = self
                    .record(NewExecutionLog::failed(job.id, started_at, finished_at, &detail, size))
                    .await;
                tracing::warn!(artifact_size = size, error = %detail, "Backup run failed");
                RunOutcome::Failed {
                    log_id,
                    artifact_size: size,
                    detail,
                }
            }
        }
    }

    async fn record(&self, log: NewExecutionLog) -> Option<i64> {
        match self.logs.append(log).await {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to write execution log");
                None
            }
        }
    }

    async fn execute(
        &self,
        job: &BackupJob,
        stage: &StageCell,
        progress: &mut RunProgress,
    ) -> Result<RunSuccess, RunFailure> {
        stage.set(RunStage::Extracting);
        let source = self.store.get_source(job.source_id).await?;
        let destination = self.store.get_destination(job.destination_id).await?;
        let spec = source.spec()?;
        let kind = spec.kind();

        let workspace = self.workspace(job.id).map_err(RunFailure::Workspace)?;
        let clock = Instant::now();
        let started = Timestamp::now().to_zoned(self.settings.timezone.clone());

        let artifact = match self
            .extract(&source.name, &spec, job.output_format, workspace.path(), &started)
            .await
        {
            Ok(artifact) => artifact,
            Err(failure) => {
                if let Some(note) = self
                    .notify_failure(&destination, &source.name, kind, &failure)
                    .await
                {
                    progress.notes.push(note);
                }
                return Err(failure);
            }
        };
        progress.artifact_size = Some(artifact.size);

        stage.set(RunStage::Delivering);
        let credentials = DestinationCredentials::decrypt(&self.vault, &destination)?;
        let caption = message::document_caption(&artifact);
        let attempts = match self.delivery.deliver(&credentials, &artifact, &caption).await {
            Ok(attempts) => attempts,
            Err(err) => {
                // The channel itself works when only the size was rejected
                if matches!(err, DeliveryError::ArtifactTooLarge { .. })
                    && self.settings.notify_on_failure
                {
                    let text = message::failure_message(&source.name, kind, &err.to_string(), &self.now());
                    if let Err(e) = self.delivery.notify(&credentials, &text).await {
                        progress.notes.push(format!("failure notification failed: {e}"));
                    }
                }
                return Err(err.into());
            }
        };

        let text = message::success_message(&source.name, kind, &artifact, clock.elapsed(), &self.now());
        if let Err(e) = self.delivery.notify(&credentials, &text).await {
            tracing::warn!(error = %e, "Success notification failed");
            progress.notes.push(format!("success notification failed: {e}"));
        }

        Ok(RunSuccess { artifact, attempts })
    }

    async fn extract(
        &self,
        source_name: &str,
        spec: &SourceSpec,
        format: OutputFormat,
        workspace: &std::path::Path,
        started: &jiff::Zoned,
    ) -> Result<Artifact, RunFailure> {
        let password: Option<Zeroizing<String>> = spec
            .password_encrypted()
            .map(|sealed| self.vault.decrypt(sealed))
            .transpose()?;

        let artifact = self
            .sources
            .extract(
                source_name,
                spec,
                password.as_ref().map(|p| p.as_str()),
                format,
                workspace,
                started,
            )
            .await?;
        Ok(artifact)
    }

    /// Best-effort failure message to the job's destination. Returns a note
    /// for the log detail when sending was attempted and failed.
    async fn notify_failure(
        &self,
        destination: &Destination,
        source_name: &str,
        kind: SourceKind,
        failure: &RunFailure,
    ) -> Option<String> {
        if !self.settings.notify_on_failure {
            return None;
        }
        let credentials = match DestinationCredentials::decrypt(&self.vault, destination) {
            Ok(credentials) => credentials,
            Err(e) => return Some(format!("failure notification skipped: {e}")),
        };
        let text = message::failure_message(source_name, kind, &failure.to_string(), &self.now());
        match self.delivery.notify(&credentials, &text).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failure notification failed");
                Some(format!("failure notification failed: {e}"))
            }
        }
    }

    fn workspace(&self, job_id: i32) -> std::io::Result<tempfile::TempDir> {
        let parent = self
            .settings
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&parent)?;
        tempfile::Builder::new()
            .prefix(&format!("telebackup-job{job_id}-"))
            .tempdir_in(parent)
    }

    fn now(&self) -> jiff::Zoned {
        Timestamp::now().to_zoned(self.settings.timezone.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::TransportError;
    use crate::jobs::testing::{SlowExtractor, TOKEN, harness, harness_with};
    use crate::models::{LogStatus, NewDestination};
    use crate::sources::SqliteExtractor;

    #[tokio::test]
    async fn test_successful_run_uploads_once_and_logs_success() {
        let h = harness();
        let job = h.sqlite_job("app", 2048);

        let outcome = h.coordinator.run_job_now(job.id).await.unwrap();

        let RunOutcome::Success { log_id, artifact_size, detail } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(log_id.is_some());
        assert_eq!(artifact_size, 2048);
        assert!(detail.starts_with("Delivered app_sqlite_"));

        let documents = h.transport.documents();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].0.ends_with("_app.db"));
        assert_eq!(documents[0].1, 2048);

        let messages = h.transport.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Backup Completed Successfully"));

        let logs = h.logs_for(job.id).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Success);
        assert_eq!(logs[0].artifact_size, 2048);
        assert!(logs[0].finished_at.to_jiff() >= logs[0].started_at.to_jiff());

        assert!(h.workspace_is_empty());
        assert!(!h.coordinator.locks().is_locked(job.id));
    }

    #[tokio::test]
    async fn test_rejected_token_logs_failure_with_extracted_size() {
        let h = harness();
        let job = h.sqlite_job("app", 512);
        h.transport.fail_documents([TransportError::permanent("401 Unauthorized")]);

        let outcome = h.coordinator.run(&job).await;

        let RunOutcome::Failed { artifact_size, detail, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(artifact_size, 512);
        assert!(detail.contains("401"));
        assert!(!detail.contains(TOKEN));
        assert_eq!(h.transport.document_calls(), 1);
        assert!(h.transport.messages().is_empty());

        let logs = h.logs_for(job.id).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Failed);
        assert_eq!(logs[0].artifact_size, 512);
        assert!(h.workspace_is_empty());
    }

    #[tokio::test]
    async fn test_oversized_artifact_is_never_uploaded() {
        let h = harness_with(
            100,
            Duration::from_secs(30),
            SourceAdapter::new().with_extractor(Arc::new(SqliteExtractor)),
        );
        let job = h.sqlite_job("big", 4096);

        let outcome = h.coordinator.run(&job).await;

        assert!(matches!(
            &outcome,
            RunOutcome::Failed { artifact_size: 4096, detail, .. } if detail.contains("upload limit")
        ));
        assert_eq!(h.transport.document_calls(), 0);
        let messages = h.transport.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Backup Failed"));
    }

    #[tokio::test]
    async fn test_extraction_failure_notifies_and_logs_zero_size() {
        let h = harness();
        let job = h.job_for("gone", "/nonexistent/path/gone.db");

        let outcome = h.coordinator.run(&job).await;

        let RunOutcome::Failed { artifact_size, detail, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(artifact_size, 0);
        assert!(detail.contains("SQLite database file not found"));
        assert_eq!(h.transport.document_calls(), 0);
        assert_eq!(h.transport.messages().len(), 1);
        assert_eq!(h.logs_for(job.id).await.len(), 1);
        assert!(h.workspace_is_empty());
    }

    #[tokio::test]
    async fn test_undecryptable_destination_fails_the_run() {
        let h = harness();
        let mut job = h.sqlite_job("app", 64);
        let destination = h.store.add_destination(NewDestination {
            name: "broken".to_string(),
            bot_token_encrypted: "not-a-ciphertext".to_string(),
            channel_id_encrypted: "not-a-ciphertext".to_string(),
        });
        job.destination_id = destination.id;
        h.store.put_job(job.clone());

        let outcome = h.coordinator.run(&job).await;

        assert!(matches!(
            &outcome,
            RunOutcome::Failed { artifact_size: 64, detail, .. }
                if detail.starts_with("credential decryption failed")
        ));
        assert_eq!(h.transport.document_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_success_notification_keeps_run_successful() {
        let h = harness();
        let job = h.sqlite_job("app", 128);
        h.transport.fail_messages([TransportError::permanent("400 Bad Request: chat not found")]);

        let outcome = h.coordinator.run(&job).await;

        let RunOutcome::Success { detail, .. } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(detail.contains("success notification failed"));
        assert_eq!(h.transport.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_with_stage_and_cleans_up() {
        let h = harness_with(
            1024 * 1024,
            Duration::from_secs(1),
            SourceAdapter::new().with_extractor(Arc::new(SlowExtractor::new(Duration::from_secs(10)))),
        );
        let job = h.sqlite_job("slow", 32);

        let outcome = h.coordinator.run(&job).await;

        let RunOutcome::Failed { artifact_size, detail, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(artifact_size, 0);
        assert_eq!(detail, "timeout after 1s while extracting");
        assert_eq!(h.logs_for(job.id).await.len(), 1);
        assert!(h.workspace_is_empty());
        assert!(!h.coordinator.locks().is_locked(job.id));
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let h = harness_with(
            1024 * 1024,
            Duration::from_secs(30),
            SourceAdapter::new().with_extractor(Arc::new(SlowExtractor::new(Duration::from_millis(300)))),
        );
        let job = h.sqlite_job("app", 16);

        let (first, second) = tokio::join!(h.coordinator.run(&job), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            h.coordinator.run(&job).await
        });

        assert!(matches!(first, RunOutcome::Success { .. }));
        assert_eq!(second, RunOutcome::Skipped);
        assert_eq!(h.logs_for(job.id).await.len(), 1);
        assert_eq!(h.transport.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_job_does_not_affect_another() {
        let h = harness();
        let broken = h.job_for("broken", "/nonexistent/broken.db");
        let healthy = h.sqlite_job("healthy", 256);

        let (a, b) = tokio::join!(h.coordinator.run(&broken), h.coordinator.run(&healthy));

        assert!(matches!(a, RunOutcome::Failed { .. }));
        assert!(matches!(b, RunOutcome::Success { artifact_size: 256, .. }));
        assert_eq!(h.logs_for(broken.id).await[0].status, LogStatus::Failed);
        assert_eq!(h.logs_for(healthy.id).await[0].status, LogStatus::Success);
    }

    #[tokio::test]
    async fn test_missing_source_is_a_logged_failure() {
        let h = harness();
        let mut job = h.sqlite_job("app", 8);
        job.source_id = 9999;
        h.store.put_job(job.clone());

        let outcome = h.coordinator.run(&job).await;

        assert!(matches!(&outcome, RunOutcome::Failed { detail, .. } if detail.contains("Source")));
        assert_eq!(h.logs_for(job.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_job_now_rejects_unknown_job() {
        let h = harness();
        let err = h.coordinator.run_job_now(404).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(h.logs.is_empty());
    }

    #[tokio::test]
    async fn test_queued_trigger_for_deactivated_job_is_skipped() {
        let h = harness();
        let mut job = h.sqlite_job("app", 8);
        job.is_active = false;
        h.store.put_job(job.clone());

        let outcome = h
            .coordinator
            .handle(RunRequest {
                job_id: job.id,
                triggered_at: Timestamp::now(),
            })
            .await;

        assert_eq!(outcome, RunOutcome::Skipped);
        assert!(h.logs.is_empty());
    }

    #[test]
    fn test_settings_reject_unknown_timezone() {
        let mut settings = Settings::default();
        settings.scheduler.timezone = "Mars/Olympus".to_string();
        assert!(CoordinatorSettings::from_settings(&settings).is_err());

        settings.scheduler.timezone = "Asia/Shanghai".to_string();
        let parsed = CoordinatorSettings::from_settings(&settings).unwrap();
        assert_eq!(parsed.timezone.iana_name(), Some("Asia/Shanghai"));
    }
}
