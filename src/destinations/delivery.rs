use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::error::DeliveryError;
use super::transport::{BotIdentity, DeliveryTransport, DestinationCredentials, TransportError};
use crate::config::{DeliveryConfig, RetrySettings};
use crate::sources::Artifact;

/// Exponential backoff for transient transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub jitter_ratio: f64,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            multiplier: settings.multiplier.max(1.0),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            jitter_ratio: settings.jitter_ratio.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (0-based), before jitter:
    /// `initial * multiplier^attempt`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff)
    }

    /// [`backoff`](Self::backoff) spread by up to `jitter_ratio` either way,
    /// still capped at `max_backoff`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt).as_secs_f64();
        if self.jitter_ratio <= 0.0 || base <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let spread = base * self.jitter_ratio;
        let jittered = rand::rng().random_range((base - spread)..=(base + spread));
        let capped = jittered.min(self.max_backoff.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff)
    }

    /// Wait before the next attempt: the server's `retry_after` when it sent
    /// one, else the jittered backoff. Never longer than `max_backoff`.
    pub fn wait_before_retry(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(requested) => requested.min(self.max_backoff),
            None => self.delay(attempt),
        }
    }
}

/// Uploads artifacts and sends notifications through a [`DeliveryTransport`],
/// retrying transient failures.
#[derive(Clone)]
pub struct DestinationDelivery {
    transport: Arc<dyn DeliveryTransport>,
    max_artifact_bytes: u64,
    retry: RetryPolicy,
}

impl std::fmt::Debug for DestinationDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationDelivery")
            .field("max_artifact_bytes", &self.max_artifact_bytes)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DestinationDelivery {
    pub fn new(transport: Arc<dyn DeliveryTransport>, config: &DeliveryConfig) -> Self {
        Self {
            transport,
            max_artifact_bytes: config.max_artifact_bytes,
            retry: RetryPolicy::from(&config.retry),
        }
    }

    pub fn max_artifact_bytes(&self) -> u64 {
        self.max_artifact_bytes
    }

    /// Upload `artifact`. Returns the number of attempts it took.
    pub async fn deliver(
        &self,
        credentials: &DestinationCredentials,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<u32, DeliveryError> {
        if artifact.size > self.max_artifact_bytes {
            return Err(DeliveryError::ArtifactTooLarge {
                size: artifact.size,
                limit: self.max_artifact_bytes,
            });
        }

        let ((), attempts) = self
            .with_retry("sendDocument", || {
                self.transport.send_document(credentials, artifact, caption)
            })
            .await?;

        tracing::info!(
            artifact = %artifact.file_name,
            artifact_size = artifact.size,
            attempts,
            "Artifact delivered"
        );
        Ok(attempts)
    }

    pub async fn notify(
        &self,
        credentials: &DestinationCredentials,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.with_retry("sendMessage", || self.transport.send_message(credentials, text))
            .await
            .map(|((), _)| ())
    }

    /// Check the bot token without retrying.
    pub async fn verify(
        &self,
        credentials: &DestinationCredentials,
    ) -> Result<BotIdentity, DeliveryError> {
        self.transport
            .verify(credentials)
            .await
            .map_err(|e| DeliveryError::DeliveryFailed {
                attempts: 1,
                reason: e.to_string(),
            })
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<(T, u32), DeliveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok((value, attempt)),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.wait_before_retry(attempt - 1, err.retry_after());
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient delivery failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(operation, attempt, error = %err, "Delivery failed");
                    return Err(DeliveryError::DeliveryFailed {
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}
