//! Credential vault for secrets stored in the configuration store.
//!
//! Secrets (database passwords, bot tokens, channel ids) are sealed with
//! AES-256-GCM under one process-wide key. The stored form is
//! `base64(nonce || ciphertext || tag)` with a fresh random 96-bit nonce per
//! encryption, so the same plaintext never encrypts to the same string twice.
//! Decrypted values come back as [`Zeroizing<String>`] and are wiped on drop.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::VaultConfig;

/// Length of the raw key in bytes
pub const KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The key is missing or malformed. Fatal at startup.
    #[error("vault configuration error: {0}")]
    Configuration(String),

    #[error("encryption failed")]
    Encryption,

    /// The ciphertext is corrupt, truncated, tampered with or sealed under another key
    #[error("decryption failed: {0}")]
    Decryption(&'static str),
}

/// Symmetric encryption of secret fields. Cheap to clone.
#[derive(Clone)]
pub struct CredentialVault {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Build the vault from the configured base64 key.
    pub fn from_config(config: &VaultConfig) -> Result<Self, VaultError> {
        Self::from_base64_key(&config.encryption_key)
    }

    pub fn from_base64_key(encoded: &str) -> Result<Self, VaultError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(VaultError::Configuration(
                "vault.encryption_key is not set".to_string(),
            ));
        }

        let raw = Zeroizing::new(STANDARD.decode(encoded).map_err(|_| {
            VaultError::Configuration("vault.encryption_key is not valid base64".to_string())
        })?);

        Self::from_key_bytes(&raw)
    }

    pub fn from_key_bytes(raw: &[u8]) -> Result<Self, VaultError> {
        if raw.len() != KEY_LEN {
            return Err(VaultError::Configuration(format!(
                "vault.encryption_key must decode to {KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, raw).map_err(|_| {
            VaultError::Configuration("vault.encryption_key was rejected".to_string())
        })?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Generate a fresh random key, base64 encoded, for operators to store.
    pub fn generate_key() -> Result<String, VaultError> {
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        SystemRandom::new()
            .fill(&mut raw[..])
            .map_err(|_| VaultError::Encryption)?;
        Ok(STANDARD.encode(&raw[..]))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
        sealed.extend_from_slice(&nonce_bytes);
        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| VaultError::Encryption)?;
        sealed.extend_from_slice(&in_out);

        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, VaultError> {
        let sealed = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| VaultError::Decryption("ciphertext is not valid base64"))?;

        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Decryption("ciphertext is truncated"));
        }

        let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| VaultError::Decryption("invalid nonce"))?;

        let mut buffer = Zeroizing::new(body.to_vec());
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), buffer.as_mut_slice())
            .map_err(|_| VaultError::Decryption("authentication failed"))?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|_| VaultError::Decryption("plaintext is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}
