use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::sources::Artifact;

/// One failed transport call, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Timeouts, connection errors, rate limits and server errors
    #[error("{message}")]
    Transient {
        message: String,
        /// Server-requested wait before the next attempt (HTTP 429)
        retry_after: Option<Duration>,
    },

    /// Bad token, missing permissions, unknown chat, malformed request
    #[error("{message}")]
    Permanent { message: String },
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        TransportError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        TransportError::Permanent {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::Transient { retry_after, .. } => *retry_after,
            TransportError::Permanent { .. } => None,
        }
    }
}

/// Decrypted destination secrets for the duration of one delivery.
pub struct DestinationCredentials {
    pub bot_token: Zeroizing<String>,
    pub chat_id: Zeroizing<String>,
}

impl std::fmt::Debug for DestinationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &"<redacted>")
            .finish()
    }
}

/// Who the bot token belongs to, as reported by `getMe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Wire-level access to the chat platform. One call per method, no retries;
/// retrying is the caller's job.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send_document(
        &self,
        credentials: &DestinationCredentials,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), TransportError>;

    async fn send_message(
        &self,
        credentials: &DestinationCredentials,
        text: &str,
    ) -> Result<(), TransportError>;

    async fn verify(&self, credentials: &DestinationCredentials) -> Result<BotIdentity, TransportError>;
}
