use std::path::PathBuf;

use async_trait::async_trait;

use super::error::ExtractionError;
use super::{ExtractRequest, SourceExtractor, artifact, blocking_io, process};
use crate::models::{SourceKind, SourceSpec};

/// Archives a container volume by running `tar` in a throwaway container that
/// mounts the volume read-only. Always produces `.tar.gz`.
#[derive(Debug, Clone)]
pub struct VolumeExtractor {
    docker: String,
    image: String,
}

impl VolumeExtractor {
    pub fn new(docker: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            image: image.into(),
        }
    }

    pub(crate) fn archive_arguments(&self, volume_name: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--network".to_string(),
            "none".to_string(),
            "-v".to_string(),
            format!("{volume_name}:/data:ro"),
            self.image.clone(),
            "tar".to_string(),
            "-C".to_string(),
            "/data".to_string(),
            "-cf".to_string(),
            "-".to_string(),
            ".".to_string(),
        ]
    }

    async fn ensure_volume_exists(&self, volume_name: &str) -> Result<(), ExtractionError> {
        let mut command = process::command(&self.docker);
        command.args(["volume", "inspect", volume_name]);
        match process::run_captured(command, "docker").await {
            Ok(_) => Ok(()),
            Err(ExtractionError::ExtractionFailed(message))
                if message.to_lowercase().contains("no such volume") =>
            {
                Err(ExtractionError::ExtractionFailed(format!(
                    "Docker volume '{volume_name}' not found"
                )))
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl SourceExtractor for VolumeExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Volume
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
        let volume_name = match request.spec {
            SourceSpec::Volume(volume) => volume.volume_name.as_str(),
            SourceSpec::Database(_) => {
                return Err(ExtractionError::ExtractionFailed(format!(
                    "source '{}' is not a volume source",
                    request.source_name
                )));
            }
        };

        self.ensure_volume_exists(volume_name).await?;

        let base = request.base_name();
        let tar_file = request.staging.join(format!("{base}.tar"));
        let mut command = process::command(&self.docker);
        command.args(self.archive_arguments(volume_name));
        let written = process::run_to_file(command, "docker", &tar_file).await?;
        tracing::debug!(volume = volume_name, bytes = written, "Volume archived");

        let output = request.staging.join(format!("{base}.tar.gz"));
        let (input, target) = (tar_file.clone(), output.clone());
        blocking_io("compress volume archive", move || artifact::gzip_file(&input, &target)).await?;
        tokio::fs::remove_file(&tar_file)
            .await
            .map_err(|e| ExtractionError::io("remove uncompressed archive", e))?;

        Ok(output)
    }
}
