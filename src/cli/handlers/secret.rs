//! Secret command handler: key generation and sealing values for storage.

use std::io::Read;

use zeroize::Zeroizing;

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::vault::{CredentialVault, VaultError};

pub struct SecretCommandHandler {
    config: Settings,
}

fn vault_error(error: VaultError) -> AppError {
    AppError::Configuration {
        key: "vault.encryption_key".to_string(),
        source: anyhow::Error::from(error),
    }
}

impl SecretCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn generate_key(&self) -> AppResult<()> {
        let key = CredentialVault::generate_key().map_err(vault_error)?;
        println!("{key}");
        eprintln!("Store it as TELEBACKUP_VAULT__ENCRYPTION_KEY. Losing it makes stored secrets unreadable.");
        Ok(())
    }

    /// Seal `value`, or standard input when absent.
    pub fn encrypt(&self, value: Option<&str>) -> AppResult<()> {
        let plaintext = match value {
            Some(value) => Zeroizing::new(value.to_string()),
            None => {
                let mut input = Zeroizing::new(String::new());
                std::io::stdin().read_to_string(&mut input)?;
                input
            }
        };
        println!("{}", self.seal(&plaintext)?);
        Ok(())
    }

    pub(crate) fn seal(&self, plaintext: &str) -> AppResult<String> {
        let plaintext = plaintext.trim_end_matches(['\r', '\n']);
        if plaintext.is_empty() {
            return Err(AppError::validation("value", "nothing to encrypt"));
        }

        self.config.vault.validate()?;
        let vault = CredentialVault::from_config(&self.config.vault).map_err(vault_error)?;
        vault.encrypt(plaintext).map_err(vault_error)
    }
}
