use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::ExtractionError;
use super::{ExtractRequest, SourceExtractor, artifact, blocking_io};
use crate::models::{OutputFormat, SourceKind};

/// Copies the database file; no external tool involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteExtractor;

#[async_trait]
impl SourceExtractor for SqliteExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Sqlite
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
        let db = request.database()?;
        let db_path = Path::new(db.sqlite_path());

        let is_file = tokio::fs::metadata(db_path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ExtractionError::ExtractionFailed(format!(
                "SQLite database file not found: {}",
                db_path.display()
            )));
        }

        let base = request.base_name();
        let db_file_name = db_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        let copy = request.staging.join(format!("{base}_{db_file_name}"));

        tokio::fs::copy(db_path, &copy)
            .await
            .map_err(|e| ExtractionError::io("copy SQLite database", e))?;

        match request.format {
            OutputFormat::RawDump => Ok(copy),
            OutputFormat::CompressedArchive => {
                let output = request.staging.join(format!("{base}.tar.gz"));
                let entry = format!("{base}_{db_file_name}");
                let (input, target) = (copy.clone(), output.clone());
                blocking_io("compress SQLite copy", move || {
                    artifact::pack_tar_gz(&input, &entry, &target)
                })
                .await?;
                tokio::fs::remove_file(&copy)
                    .await
                    .map_err(|e| ExtractionError::io("remove uncompressed copy", e))?;
                Ok(output)
            }
        }
    }
}
