//! Serve command handler
//!
//! Starts the long-running process, or with `--dry-run` checks everything
//! startup would check without touching the network.

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::CoordinatorSettings;
use crate::server::Server;
use crate::vault::CredentialVault;

pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            return self.validate_only();
        }
        Server::new(self.config).run().await
    }

    /// Validate configuration without starting the server
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;
        self.config.database.validate()?;
        println!("✓ Configuration is valid");

        self.config.vault.validate()?;
        CredentialVault::from_config(&self.config.vault).map_err(|e| AppError::Configuration {
            key: "vault.encryption_key".to_string(),
            source: anyhow::Error::from(e),
        })?;
        println!("✓ Encryption key is usable");

        let coordinator = CoordinatorSettings::from_settings(&self.config)?;
        if self.config.scheduler.enabled {
            println!(
                "✓ Scheduler: {} worker(s), queue of {}, schedules in {}, {}s job timeout",
                self.config.scheduler.worker_pool_size,
                self.config.scheduler.queue_capacity,
                self.config.scheduler.timezone,
                coordinator.default_timeout.as_secs()
            );
        } else {
            println!("✓ Scheduler disabled, manual runs only");
        }

        if self.config.server.enabled {
            println!("✓ API would bind to: {}", self.config.server.address());
        } else {
            println!("✓ API disabled");
        }

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
