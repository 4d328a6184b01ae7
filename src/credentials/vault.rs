//! AES-256-GCM protection for API keys at rest.
//!
//! Ciphertext format: URL-safe base64 (no padding) of
//! `nonce (12 bytes) ‖ ciphertext ‖ tag (16 bytes)`. A fresh random nonce is
//! drawn for every encryption, so encrypting the same key twice yields
//! different records.

use crate::config::DeploymentConfig;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use thiserror::Error;
use tracing::warn;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The master secret is not base64 for exactly 32 bytes.
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// No master secret is configured; nothing can be protected.
    #[error("key vault is disabled: no master key configured (set ENCRYPTION_MASTER_KEY)")]
    Disabled,

    #[error("encryption failed: {0}")]
    Encrypt(String),
}

/// Encrypts and decrypts stored API keys with the deployment's master secret.
pub struct KeyVault {
    cipher: Option<Aes256Gcm>,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("secure", &self.is_secure())
            .finish()
    }
}

impl KeyVault {
    /// Build a vault from a base64-encoded 32-byte master secret.
    ///
    /// Standard and URL-safe alphabets are accepted, padded or not.
    pub fn new(master: &SecretString) -> Result<Self, VaultError> {
        let key = decode_master_key(master.expose_secret())?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| VaultError::InvalidMasterKey(e.to_string()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// A vault with no master secret. It refuses to encrypt and decrypts
    /// everything to `""`.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Build from deployment configuration.
    ///
    /// A missing master secret yields a disabled vault and a warning; a
    /// malformed one is an error.
    pub fn from_config(config: &DeploymentConfig) -> Result<Self, VaultError> {
        match &config.master_key {
            Some(master) => Self::new(master),
            None => {
                warn!(
                    "ENCRYPTION_MASTER_KEY is not set: stored API keys cannot be decrypted, \
                     only request keys and deployment fallback keys will be used"
                );
                Ok(Self::disabled())
            }
        }
    }

    /// Whether a real master secret is configured.
    pub fn is_secure(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt `plaintext`. The empty string encrypts to the empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let cipher = self.cipher.as_ref().ok_or(VaultError::Disabled)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encrypt(e.to_string()))?;

        let mut record = Vec::with_capacity(NONCE_LEN + sealed.len());
        record.extend_from_slice(&nonce);
        record.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(record))
    }

    /// Decrypt a record produced by [`KeyVault::encrypt`].
    ///
    /// Never fails: anything that cannot be decrypted (corrupt, wrong master
    /// secret, disabled vault) comes back as `""` with a warning.
    pub fn decrypt(&self, ciphertext: &str) -> String {
        if ciphertext.is_empty() {
            return String::new();
        }
        match self.try_decrypt(ciphertext) {
            Ok(plain) => plain,
            Err(reason) => {
                warn!("Stored API key decryption failed: {}", reason);
                String::new()
            }
        }
    }

    fn try_decrypt(&self, ciphertext: &str) -> Result<String, &'static str> {
        let cipher = self.cipher.as_ref().ok_or("vault is disabled")?;
        let raw = URL_SAFE_NO_PAD
            .decode(ciphertext.trim().trim_end_matches('='))
            .map_err(|_| "record is not valid base64")?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err("record is too short");
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| "authentication tag mismatch")?;
        String::from_utf8(plain).map_err(|_| "plaintext is not UTF-8")
    }
}

/// Fresh random master secret, base64-encoded, for operators.
pub fn generate_master_key() -> String {
    STANDARD.encode(Aes256Gcm::generate_key(&mut OsRng))
}

fn decode_master_key(encoded: &str) -> Result<Vec<u8>, VaultError> {
    let encoded = encoded.trim();
    let bytes = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
        .ok_or_else(|| VaultError::InvalidMasterKey("not valid base64".into()))?;
    if bytes.len() != KEY_LEN {
        return Err(VaultError::InvalidMasterKey(format!(
            "expected {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
