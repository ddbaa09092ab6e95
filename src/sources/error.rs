use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Connection, authentication or daemon failure. Usually goes away on its own.
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),

    /// The tool ran and failed, or the input is missing. Retrying will not help.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("insufficient space: {0}")]
    InsufficientSpace(String),
}

impl ExtractionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::SourceUnreachable(_))
    }

    /// Map a local I/O failure while writing the artifact.
    pub fn io(context: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::StorageFull => {
                ExtractionError::InsufficientSpace(format!("{context}: {error}"))
            }
            _ => ExtractionError::ExtractionFailed(format!("{context}: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_transient() {
        assert!(ExtractionError::SourceUnreachable("refused".into()).is_transient());
        assert!(!ExtractionError::ExtractionFailed("exit 1".into()).is_transient());
        assert!(!ExtractionError::InsufficientSpace("disk".into()).is_transient());
    }

    #[test]
    fn test_full_disk_maps_to_insufficient_space() {
        let err = ExtractionError::io("write dump", io::Error::from(io::ErrorKind::StorageFull));
        assert!(matches!(err, ExtractionError::InsufficientSpace(_)));

        let err = ExtractionError::io("write dump", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ExtractionError::ExtractionFailed(_)));
    }
}
