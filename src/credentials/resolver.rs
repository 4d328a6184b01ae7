//! Decides which API key secures each provider call.
//!
//! Precedence, first match wins:
//!
//! 1. the key sent with the request,
//! 2. the user's stored key for that provider (canonical name, then aliases),
//!    decrypted by the [`KeyVault`],
//! 3. the deployment's fallback key for that provider.
//!
//! A stored record that decrypts to nothing counts as absent, and a failing
//! store is logged and skipped, so both fall through to step 3.

use super::store::KeyRecordStore;
use super::vault::{KeyVault, VaultError};
use crate::config::DeploymentConfig;
use crate::error::NotePptError;
use crate::provider::{ProviderConfig, ProviderKind};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a resolved key came from. Logged; the key itself never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    Stored,
    Fallback,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Explicit => "request",
            CredentialSource::Stored => "stored",
            CredentialSource::Fallback => "deployment fallback",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub key: SecretString,
    pub source: CredentialSource,
}

pub struct CredentialResolver {
    vault: KeyVault,
    store: Option<Arc<dyn KeyRecordStore>>,
    deployment: DeploymentConfig,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("vault", &self.vault)
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .field("deployment", &self.deployment)
            .finish()
    }
}

impl CredentialResolver {
    pub fn new(vault: KeyVault, deployment: DeploymentConfig) -> Self {
        Self {
            vault,
            store: None,
            deployment,
        }
    }

    /// Resolver whose vault is built from the deployment's master secret.
    pub fn from_deployment(deployment: DeploymentConfig) -> Result<Self, VaultError> {
        let vault = KeyVault::from_config(&deployment)?;
        Ok(Self::new(vault, deployment))
    }

    /// Enable stored-key lookup through `store`.
    pub fn with_store(mut self, store: Arc<dyn KeyRecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    /// Resolve the API key for `kind`.
    ///
    /// # Errors
    /// [`NotePptError::MissingCredential`] when no source has a key.
    pub async fn resolve_key(
        &self,
        kind: ProviderKind,
        explicit: Option<&SecretString>,
        user_id: Option<&str>,
    ) -> Result<ResolvedCredential, NotePptError> {
        let resolved = if let Some(key) = explicit.filter(|k| !k.expose_secret().trim().is_empty()) {
            Some(ResolvedCredential {
                key: key.clone(),
                source: CredentialSource::Explicit,
            })
        } else if let Some(key) = self.stored_key(kind, user_id).await {
            Some(ResolvedCredential {
                key,
                source: CredentialSource::Stored,
            })
        } else {
            self.deployment
                .fallback_key(kind)
                .map(|key| ResolvedCredential {
                    key: key.clone(),
                    source: CredentialSource::Fallback,
                })
        };

        match resolved {
            Some(credential) => {
                debug!("Using {} API key for {}", credential.source, kind);
                Ok(credential)
            }
            None => Err(NotePptError::MissingCredential {
                provider: kind.to_string(),
            }),
        }
    }

    async fn stored_key(&self, kind: ProviderKind, user_id: Option<&str>) -> Option<SecretString> {
        let (store, user_id) = match (&self.store, user_id.filter(|u| !u.is_empty())) {
            (Some(store), Some(user_id)) => (store, user_id),
            _ => return None,
        };

        let records = match store.get_encrypted_keys(user_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Key store lookup failed, falling back: {}", e);
                return None;
            }
        };

        std::iter::once(kind.as_str())
            .chain(kind.aliases().iter().copied())
            .filter_map(|name| records.get(name))
            .map(|ciphertext| self.vault.decrypt(ciphertext))
            .find(|plain| !plain.is_empty())
            .map(SecretString::from)
    }

    /// Explicit model if non-blank, else the provider's default.
    pub fn resolve_model(kind: ProviderKind, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(kind.default_model())
            .to_string()
    }

    /// Key and model for one job.
    pub async fn resolve_provider_config(
        &self,
        kind: ProviderKind,
        explicit_key: Option<&SecretString>,
        explicit_model: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<ProviderConfig, NotePptError> {
        let credential = self.resolve_key(kind, explicit_key, user_id).await?;
        Ok(ProviderConfig {
            kind,
            api_key: credential.key,
            model: Self::resolve_model(kind, explicit_model),
        })
    }
}
