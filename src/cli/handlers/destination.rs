//! Destination command handler

use crate::config::settings::Settings;
use crate::db::establish_async_connection_pool;
use crate::destinations::{BotIdentity, DestinationCredentials};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub struct DestinationCommandHandler {
    config: Settings,
}

impl DestinationCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn verify(&self, destination_id: i32) -> AppResult<()> {
        let pool = establish_async_connection_pool(&self.config.database).await?;
        let state = AppState::new(&self.config, pool)?;

        let bot = verify_destination(&state, destination_id).await?;
        println!(
            "✓ Destination {destination_id} works: bot {} (@{}, id {})",
            bot.first_name,
            bot.username.as_deref().unwrap_or("-"),
            bot.id
        );
        Ok(())
    }
}

/// Decrypt the destination's credentials and ask the Bot API who they
/// belong to. Neither the token nor the chat id is printed or logged.
pub(crate) async fn verify_destination(state: &AppState, destination_id: i32) -> AppResult<BotIdentity> {
    let destination = state.store.get_destination(destination_id).await?;
    let credentials = DestinationCredentials::decrypt(&state.vault, &destination).map_err(|e| {
        AppError::BadRequest {
            message: format!("credentials of destination {destination_id} cannot be decrypted: {e}"),
        }
    })?;

    state
        .delivery
        .verify(&credentials)
        .await
        .map_err(|e| AppError::BadRequest {
            message: format!("destination {destination_id} rejected: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDestination;
    use crate::state::testing::test_state;

    #[tokio::test]
    async fn test_verify_uses_decrypted_credentials() {
        let test = test_state();
        let destination = test.store.add_destination(NewDestination {
            name: "ops".to_string(),
            bot_token_encrypted: test.state.vault.encrypt("1:token").unwrap(),
            channel_id_encrypted: test.state.vault.encrypt("-100").unwrap(),
        });

        let bot = verify_destination(&test.state, destination.id).await.unwrap();
        assert_eq!(bot.username.as_deref(), Some("fake_bot"));
    }

    #[tokio::test]
    async fn test_verify_reports_undecryptable_credentials() {
        let test = test_state();
        let destination = test.store.add_destination(NewDestination {
            name: "ops".to_string(),
            bot_token_encrypted: "bm90IHNlYWxlZA==".to_string(),
            channel_id_encrypted: "bm90IHNlYWxlZA==".to_string(),
        });

        let result = verify_destination(&test.state, destination.id).await;
        assert!(matches!(result, Err(AppError::BadRequest { message }) if message.contains("cannot be decrypted")));
    }

    #[tokio::test]
    async fn test_verify_unknown_destination() {
        let test = test_state();
        assert!(matches!(
            verify_destination(&test.state, 5).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
