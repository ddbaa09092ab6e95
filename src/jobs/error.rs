use std::fmt;

use thiserror::Error;

use crate::destinations::DeliveryError;
use crate::error::AppError;
use crate::sources::ExtractionError;
use crate::vault::VaultError;

/// Pipeline stage of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunStage {
    Locking = 0,
    Extracting = 1,
    Delivering = 2,
    Logging = 3,
}

impl RunStage {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => RunStage::Locking,
            1 => RunStage::Extracting,
            2 => RunStage::Delivering,
            _ => RunStage::Logging,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Locking => "locking",
            RunStage::Extracting => "extracting",
            RunStage::Delivering => "delivering",
            RunStage::Logging => "logging",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in a failed execution log.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// Loading the job's source or destination failed, or the row is invalid
    #[error("{0}")]
    Store(#[from] AppError),

    #[error("credential decryption failed: {0}")]
    Decryption(#[from] VaultError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("could not prepare workspace: {0}")]
    Workspace(std::io::Error),

    #[error("timeout after {seconds}s while {stage}")]
    Timeout { seconds: u64, stage: RunStage },
}
