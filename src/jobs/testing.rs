//! Shared fixtures for coordinator, worker and scheduler tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jiff::tz::TimeZone;

use super::coordinator::{CoordinatorSettings, ExecutionCoordinator};
use crate::config::{DeliveryConfig, RetrySettings};
use crate::destinations::DestinationDelivery;
use crate::destinations::fake::RecordingTransport;
use crate::models::{
    BackupJob, DbEngine, ExecutionLog, ExecutionLogQuery, NewBackupJob, NewDestination, NewSource,
    OutputFormat, SourceKind,
};
use crate::repositories::{ExecutionLogStore, InMemoryConfigStore, InMemoryExecutionLogStore};
use crate::sources::{ExtractRequest, ExtractionError, SourceAdapter, SourceExtractor, SqliteExtractor};
use crate::vault::CredentialVault;

pub const TOKEN: &str = "123456:secret-bot-token";

/// Sleeps before copying the SQLite file, so runs overlap and time out.
/// Records the highest number of extractions in flight at once.
#[derive(Debug)]
pub struct SlowExtractor {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowExtractor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceExtractor for SlowExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Sqlite
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = SqliteExtractor.extract(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub struct Harness {
    pub store: Arc<InMemoryConfigStore>,
    pub logs: Arc<InMemoryExecutionLogStore>,
    pub transport: Arc<RecordingTransport>,
    pub vault: CredentialVault,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub work_dir: tempfile::TempDir,
    pub data_dir: tempfile::TempDir,
}

pub fn vault() -> CredentialVault {
    CredentialVault::from_key_bytes(&[7u8; 32]).unwrap()
}

fn delivery_config(max_artifact_bytes: u64) -> DeliveryConfig {
    DeliveryConfig {
        max_artifact_bytes,
        retry: RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 1,
            multiplier: 2.0,
            max_backoff_ms: 5,
            jitter_ratio: 0.0,
        },
        ..Default::default()
    }
}

pub fn harness_with(max_artifact_bytes: u64, default_timeout: Duration, sources: SourceAdapter) -> Harness {
    let store = Arc::new(InMemoryConfigStore::new());
    let logs = Arc::new(InMemoryExecutionLogStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let work_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();

    let coordinator = ExecutionCoordinator::new(
        store.clone(),
        logs.clone(),
        vault(),
        sources,
        DestinationDelivery::new(transport.clone(), &delivery_config(max_artifact_bytes)),
        CoordinatorSettings {
            default_timeout,
            timezone: TimeZone::UTC,
            work_dir: Some(work_dir.path().to_path_buf()),
            notify_on_failure: true,
        },
    );

    Harness {
        store,
        logs,
        transport,
        vault: vault(),
        coordinator: Arc::new(coordinator),
        work_dir,
        data_dir,
    }
}

pub fn harness() -> Harness {
    harness_with(
        1024 * 1024,
        Duration::from_secs(30),
        SourceAdapter::new().with_extractor(Arc::new(SqliteExtractor)),
    )
}

impl Harness {
    /// A SQLite file of `size` bytes, a destination and an active raw-dump job.
    pub fn sqlite_job(&self, name: &str, size: usize) -> BackupJob {
        let db_path = self.data_dir.path().join(format!("{name}.db"));
        std::fs::write(&db_path, vec![b'x'; size]).unwrap();
        self.job_for(name, db_path.to_string_lossy().as_ref())
    }

    pub fn job_for(&self, name: &str, db_path: &str) -> BackupJob {
        let source = self
            .store
            .add_source(NewSource::database(name, DbEngine::Sqlite, db_path));
        let destination = self.store.add_destination(NewDestination {
            name: format!("{name}-channel"),
            bot_token_encrypted: self.vault.encrypt(TOKEN).unwrap(),
            channel_id_encrypted: self.vault.encrypt("-1001234").unwrap(),
        });
        self.store
            .add_job(NewBackupJob {
                name: format!("{name}-nightly"),
                source_id: source.id,
                destination_id: destination.id,
                cron_expression: "0 2 * * *".to_string(),
                output_format: OutputFormat::RawDump,
                is_active: true,
                timeout_secs: None,
            })
            .unwrap()
    }

    pub async fn logs_for(&self, job_id: i32) -> Vec<ExecutionLog> {
        self.logs
            .query(&ExecutionLogQuery::for_job(job_id))
            .await
            .unwrap()
    }

    pub fn workspace_is_empty(&self) -> bool {
        std::fs::read_dir(self.work_dir.path()).unwrap().next().is_none()
    }
}
