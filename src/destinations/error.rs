use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Checked before any transport call
    #[error("artifact is {size} bytes, above the {limit} byte upload limit")]
    ArtifactTooLarge { size: u64, limit: u64 },

    #[error("delivery failed after {attempts} attempt(s): {reason}")]
    DeliveryFailed { attempts: u32, reason: String },
}

impl DeliveryError {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryError::ArtifactTooLarge { .. } => 0,
            DeliveryError::DeliveryFailed { attempts, .. } => *attempts,
        }
    }
}
