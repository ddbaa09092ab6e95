//! Source adapters: turn a source description into a backup artifact.
//!
//! Each [`SourceKind`] has one [`SourceExtractor`]. [`SourceAdapter`] picks
//! the extractor for a source, gives it a private staging directory inside the
//! run workspace, and only moves the result out of staging once the extractor
//! succeeded. A failed or cancelled extraction drops the staging directory,
//! so a partial dump never reaches delivery.

mod artifact;
mod error;
mod mysql;
mod postgres;
mod process;
mod sqlite;
mod volume;

pub use artifact::{Artifact, base_name, sanitize_name};
pub use error::ExtractionError;
pub use mysql::MySqlExtractor;
pub use postgres::PostgresExtractor;
pub use sqlite::SqliteExtractor;
pub use volume::VolumeExtractor;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Zoned;

use crate::config::SourcesConfig;
use crate::models::{DatabaseSource, OutputFormat, SourceKind, SourceSpec};

/// Everything an extractor needs for one run.
#[derive(Debug)]
pub struct ExtractRequest<'a> {
    pub source_name: &'a str,
    pub spec: &'a SourceSpec,
    /// Decrypted database password, owned and zeroed by the caller
    pub password: Option<&'a str>,
    pub format: OutputFormat,
    /// Scratch directory owned by the adapter; write the artifact here
    pub staging: &'a Path,
    pub started_at: &'a Zoned,
}

impl ExtractRequest<'_> {
    pub fn base_name(&self) -> String {
        base_name(self.source_name, self.spec.kind(), self.started_at)
    }

    /// The database variant, or a permanent failure when the table routed a
    /// volume to a database extractor.
    pub fn database(&self) -> Result<&DatabaseSource, ExtractionError> {
        match self.spec {
            SourceSpec::Database(db) => Ok(db),
            SourceSpec::Volume(_) => Err(ExtractionError::ExtractionFailed(format!(
                "source '{}' is not a database source",
                self.source_name
            ))),
        }
    }
}

#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Produce the artifact inside `request.staging` and return its path.
    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError>;
}

/// Capability table keyed by source kind.
#[derive(Clone, Default)]
pub struct SourceAdapter {
    extractors: HashMap<SourceKind, Arc<dyn SourceExtractor>>,
}

impl std::fmt::Debug for SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("kinds", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in extractors, with tool paths from the `sources` settings.
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new()
            .with_extractor(Arc::new(PostgresExtractor::new(&config.pg_dump_path)))
            .with_extractor(Arc::new(MySqlExtractor::new(&config.mysqldump_path)))
            .with_extractor(Arc::new(SqliteExtractor))
            .with_extractor(Arc::new(VolumeExtractor::new(
                &config.docker_path,
                &config.volume_archive_image,
            )))
    }

    /// Register or replace the extractor for its kind.
    pub fn with_extractor(mut self, extractor: Arc<dyn SourceExtractor>) -> Self {
        self.extractors.insert(extractor.kind(), extractor);
        self
    }

    pub fn supports(&self, kind: SourceKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    /// Extract `spec` into `workspace`.
    ///
    /// On success the artifact sits directly in `workspace`; on failure nothing
    /// the extractor wrote is left behind.
    pub async fn extract(
        &self,
        source_name: &str,
        spec: &SourceSpec,
        password: Option<&str>,
        format: OutputFormat,
        workspace: &Path,
        started_at: &Zoned,
    ) -> Result<Artifact, ExtractionError> {
        let kind = spec.kind();
        let extractor = self.extractors.get(&kind).ok_or_else(|| {
            ExtractionError::ExtractionFailed(format!("no extractor registered for {kind} sources"))
        })?;

        let staging = tempfile::Builder::new()
            .prefix("staging-")
            .tempdir_in(workspace)
            .map_err(|e| ExtractionError::io("create staging directory", e))?;

        let request = ExtractRequest {
            source_name,
            spec,
            password,
            format,
            staging: staging.path(),
            started_at,
        };
        tracing::debug!(source = source_name, kind = %kind, format = format.as_str(), "Extracting source");
        let produced = extractor.extract(&request).await?;

        let file_name = produced
            .file_name()
            .ok_or_else(|| ExtractionError::ExtractionFailed("extractor returned a path without a file name".to_string()))?;
        let final_path = workspace.join(file_name);
        tokio::fs::rename(&produced, &final_path)
            .await
            .map_err(|e| ExtractionError::io("move artifact out of staging", e))?;
        drop(staging);

        let path = final_path.clone();
        let artifact = tokio::task::spawn_blocking(move || Artifact::from_file(&path))
            .await
            .map_err(|e| ExtractionError::ExtractionFailed(format!("checksum task failed: {e}")))?
            .map_err(|e| ExtractionError::io("checksum artifact", e))?;

        tracing::info!(
            source = source_name,
            kind = %kind,
            artifact = %artifact.file_name,
            artifact_size = artifact.size,
            "Source extracted"
        );
        Ok(artifact)
    }
}

/// Run a blocking archive step off the async runtime.
pub(crate) async fn blocking_io<F>(context: &'static str, f: F) -> Result<(), ExtractionError>
where
    F: FnOnce() -> std::io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractionError::ExtractionFailed(format!("{context}: {e}")))?
        .map_err(|e| ExtractionError::io(context, e))
}

/// Finish a plain `.sql` dump according to the output format.
pub(crate) async fn finalize_sql_dump(
    sql_file: PathBuf,
    request: &ExtractRequest<'_>,
) -> Result<PathBuf, ExtractionError> {
    match request.format {
        OutputFormat::RawDump => Ok(sql_file),
        OutputFormat::CompressedArchive => {
            let base = request.base_name();
            let output = request.staging.join(format!("{base}.tar.gz"));
            let entry = format!("{base}.sql");
            let (input, target) = (sql_file.clone(), output.clone());
            blocking_io("compress dump", move || artifact::pack_tar_gz(&input, &entry, &target))
                .await?;
            tokio::fs::remove_file(&sql_file)
                .await
                .map_err(|e| ExtractionError::io("remove uncompressed dump", e))?;
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DbEngine, VolumeSource};
    use jiff::civil::date;

    /// Writes a fixed payload, or fails after writing a partial file.
    struct ScriptedExtractor {
        fail: bool,
    }

    #[async_trait]
    impl SourceExtractor for ScriptedExtractor {
        fn kind(&self) -> SourceKind {
            SourceKind::Volume
        }

        async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
            let path = request.staging.join(format!("{}.tar.gz", request.base_name()));
            tokio::fs::write(&path, b"partial").await.unwrap();
            if self.fail {
                Err(ExtractionError::SourceUnreachable("daemon down".to_string()))
            } else {
                Ok(path)
            }
        }
    }

    fn volume() -> SourceSpec {
        SourceSpec::Volume(VolumeSource {
            volume_name: "data".to_string(),
        })
    }

    fn at() -> Zoned {
        date(2024, 1, 15).at(2, 0, 0, 0).in_tz("UTC").unwrap()
    }

    #[tokio::test]
    async fn test_successful_extraction_leaves_only_the_artifact() {
        let workspace = tempfile::tempdir().unwrap();
        let adapter = SourceAdapter::new().with_extractor(Arc::new(ScriptedExtractor { fail: false }));

        let artifact = adapter
            .extract("files", &volume(), None, OutputFormat::CompressedArchive, workspace.path(), &at())
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "files_volume_20240115_020000.tar.gz");
        assert_eq!(artifact.size, 7);
        let entries: Vec<_> = std::fs::read_dir(workspace.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_extraction_leaves_nothing() {
        let workspace = tempfile::tempdir().unwrap();
        let adapter = SourceAdapter::new().with_extractor(Arc::new(ScriptedExtractor { fail: true }));

        let err = adapter
            .extract("files", &volume(), None, OutputFormat::RawDump, workspace.path(), &at())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_kind_fails() {
        let workspace = tempfile::tempdir().unwrap();
        let spec = SourceSpec::Database(DatabaseSource {
            engine: DbEngine::Postgres,
            host: None,
            port: None,
            database: "app".to_string(),
            user: None,
            password_encrypted: None,
        });

        let err = SourceAdapter::new()
            .extract("app", &spec, None, OutputFormat::RawDump, workspace.path(), &at())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
    }

    #[test]
    fn test_from_config_registers_every_kind() {
        let adapter = SourceAdapter::from_config(&SourcesConfig::default());
        for kind in [SourceKind::Postgres, SourceKind::MySql, SourceKind::Sqlite, SourceKind::Volume] {
            assert!(adapter.supports(kind));
        }
    }
}
