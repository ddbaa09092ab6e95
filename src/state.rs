//! Shared application state.
//!
//! One `AppState` wires the stores, the vault, the delivery layer, the
//! coordinator and the scheduler together. The server hands it to axum; the
//! one-shot CLI commands build the same state so manual runs behave exactly
//! like scheduled ones.

use std::sync::Arc;

use jiff::Timestamp;

use crate::config::Settings;
use crate::db::AsyncDbPool;
use crate::destinations::{DeliveryTransport, DestinationDelivery, TelegramTransport};
use crate::error::{AppError, AppResult};
use crate::jobs::{CoordinatorSettings, DueJobScheduler, ExecutionCoordinator};
use crate::repositories::{ConfigStore, ExecutionLogStore, Repositories};
use crate::sources::SourceAdapter;
use crate::vault::CredentialVault;

/// Cloning is cheap: every member is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub logs: Arc<dyn ExecutionLogStore>,
    pub vault: CredentialVault,
    pub delivery: DestinationDelivery,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub scheduler: Arc<DueJobScheduler>,
    /// `None` when the stores are not backed by Postgres
    pub db_pool: Option<AsyncDbPool>,
    pub started_at: Timestamp,
}

impl AppState {
    /// State backed by the Postgres repositories and the Telegram Bot API.
    pub fn new(settings: &Settings, pool: AsyncDbPool) -> AppResult<Self> {
        let repos = Repositories::new(pool.clone());
        let logs: Arc<dyn ExecutionLogStore> = Arc::new(repos.logs.clone());
        let transport = Arc::new(TelegramTransport::new(&settings.delivery)?);
        Self::assemble(settings, Arc::new(repos), logs, transport, Some(pool))
    }

    /// State over arbitrary stores and transport.
    pub fn assemble(
        settings: &Settings,
        store: Arc<dyn ConfigStore>,
        logs: Arc<dyn ExecutionLogStore>,
        transport: Arc<dyn DeliveryTransport>,
        db_pool: Option<AsyncDbPool>,
    ) -> AppResult<Self> {
        settings.vault.validate()?;
        let vault = CredentialVault::from_config(&settings.vault).map_err(|e| {
            AppError::Configuration {
                key: "vault.encryption_key".to_string(),
                source: anyhow::Error::from(e),
            }
        })?;

        let delivery = DestinationDelivery::new(transport, &settings.delivery);
        let coordinator = ExecutionCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&logs),
            vault.clone(),
            SourceAdapter::from_config(&settings.sources),
            delivery.clone(),
            CoordinatorSettings::from_settings(settings)?,
        );
        let scheduler = DueJobScheduler::from_config(Arc::clone(&store), &settings.scheduler)?;

        Ok(Self {
            store,
            logs,
            vault,
            delivery,
            coordinator: Arc::new(coordinator),
            scheduler: Arc::new(scheduler),
            db_pool,
            started_at: Timestamp::now(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::destinations::fake::RecordingTransport;
    use crate::repositories::{InMemoryConfigStore, InMemoryExecutionLogStore};
    use crate::vault::KEY_LEN;
    use base64::Engine;

    pub struct TestState {
        pub state: AppState,
        pub store: Arc<InMemoryConfigStore>,
        pub logs: Arc<InMemoryExecutionLogStore>,
        pub transport: Arc<RecordingTransport>,
    }

    pub fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.vault.encryption_key =
            base64::engine::general_purpose::STANDARD.encode([9u8; KEY_LEN]);
        settings
    }

    /// In-memory state with a recording transport.
    pub fn test_state() -> TestState {
        let store = Arc::new(InMemoryConfigStore::new());
        let logs = Arc::new(InMemoryExecutionLogStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let state = AppState::assemble(
            &settings(),
            store.clone(),
            logs.clone(),
            transport.clone(),
            None,
        )
        .unwrap();
        TestState {
            state,
            store,
            logs,
            transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_missing_vault_key_is_a_configuration_error() {
        let store = Arc::new(crate::repositories::InMemoryConfigStore::new());
        let logs = Arc::new(crate::repositories::InMemoryExecutionLogStore::new());
        let transport = Arc::new(crate::destinations::fake::RecordingTransport::default());

        let result = AppState::assemble(&Settings::default(), store, logs, transport, None);
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_assembled_state_shares_the_vault_key() {
        let test = test_state();
        let sealed = test.state.vault.encrypt("secret").unwrap();
        assert_eq!(test.state.vault.decrypt(&sealed).unwrap().as_str(), "secret");
        assert!(test.state.db_pool.is_none());
    }
}
