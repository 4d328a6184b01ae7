//! Credential subsystem: which API key secures each provider call, and how
//! stored keys are protected at rest.

pub mod resolver;
pub mod store;
pub mod vault;

pub use resolver::{CredentialResolver, CredentialSource, ResolvedCredential};
pub use store::{EncryptedKeyRecord, InMemoryKeyStore, JsonFileKeyStore, KeyRecordStore, StoreError};
pub use vault::{generate_master_key, KeyVault, VaultError};
