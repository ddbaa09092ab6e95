//! Destination delivery: uploading artifacts and sending notifications to a
//! Telegram chat.
//!
//! [`DestinationDelivery`] owns the size limit and the retry loop;
//! [`DeliveryTransport`] is the single-attempt wire layer, implemented by
//! [`TelegramTransport`].

mod delivery;
mod error;
pub mod message;
mod telegram;
mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use delivery::{DestinationDelivery, RetryPolicy};
pub use error::DeliveryError;
pub use telegram::TelegramTransport;
pub use transport::{BotIdentity, DeliveryTransport, DestinationCredentials, TransportError};

use zeroize::Zeroizing;

use crate::models::Destination;
use crate::vault::{CredentialVault, VaultError};

impl DestinationCredentials {
    /// Open the sealed token and chat id of `destination`.
    pub fn decrypt(vault: &CredentialVault, destination: &Destination) -> Result<Self, VaultError> {
        Ok(Self {
            bot_token: vault.decrypt(&destination.bot_token_encrypted)?,
            chat_id: vault.decrypt(&destination.channel_id_encrypted)?,
        })
    }

    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: Zeroizing::new(bot_token.into()),
            chat_id: Zeroizing::new(chat_id.into()),
        }
    }
}
