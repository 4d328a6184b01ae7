//! Persistence boundary for encrypted per-user key records.
//!
//! The conversion core never owns the key database. It asks a
//! [`KeyRecordStore`] for one user's `provider → ciphertext` map and decrypts
//! what it needs. Two implementations ship with the crate: an in-memory map
//! for tests and embedders, and a JSON file for the CLI.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Encrypted key records for one user: provider name → ciphertext.
pub type EncryptedKeyRecord = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key store I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key store '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("key store backend error: {0}")]
    Backend(String),
}

/// Source of encrypted key records.
///
/// An unknown user is not an error: return an empty map.
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    async fn get_encrypted_keys(&self, user_id: &str) -> Result<EncryptedKeyRecord, StoreError>;
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    records: RwLock<HashMap<String, EncryptedKeyRecord>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `ciphertext` for `user_id` under `provider`, replacing any
    /// previous record.
    pub fn insert(&self, user_id: &str, provider: &str, ciphertext: impl Into<String>) {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records
            .entry(user_id.to_string())
            .or_default()
            .insert(provider.to_string(), ciphertext.into());
    }
}

#[async_trait]
impl KeyRecordStore for InMemoryKeyStore {
    async fn get_encrypted_keys(&self, user_id: &str) -> Result<EncryptedKeyRecord, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))?;
        Ok(records.get(user_id).cloned().unwrap_or_default())
    }
}

// ── JSON file ────────────────────────────────────────────────────────────

/// Read-only store backed by a JSON file of the form
/// `{ "<user_id>": { "<provider>": "<ciphertext>" } }`.
///
/// The file is read on every lookup so edits take effect without a restart.
/// A missing file behaves like an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileKeyStore {
    path: PathBuf,
}

impl JsonFileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyRecordStore for JsonFileKeyStore {
    async fn get_encrypted_keys(&self, user_id: &str) -> Result<EncryptedKeyRecord, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let mut all: HashMap<String, EncryptedKeyRecord> =
            serde_json::from_str(&text).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(all.remove(user_id).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn in_memory_unknown_user_is_empty() {
        let store = InMemoryKeyStore::new();
        store.insert("alice", "openai", "ct-1");
        let got = tokio_test::block_on(store.get_encrypted_keys("bob")).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn in_memory_insert_replaces() {
        let store = InMemoryKeyStore::new();
        store.insert("alice", "openai", "ct-1");
        store.insert("alice", "openai", "ct-2");
        store.insert("alice", "gemini", "ct-3");
        let got = tokio_test::block_on(store.get_encrypted_keys("alice")).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["openai"], "ct-2");
    }

    #[tokio::test]
    async fn json_file_reads_one_user() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"alice": {{"claude": "ct-a"}}, "bob": {{"gemini": "ct-b"}}}}"#
        )
        .unwrap();
        let store = JsonFileKeyStore::new(f.path());
        let got = store.get_encrypted_keys("alice").await.unwrap();
        assert_eq!(got.get("claude").map(String::as_str), Some("ct-a"));
        assert!(!got.contains_key("gemini"));
    }

    #[tokio::test]
    async fn json_file_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileKeyStore::new(dir.path().join("absent.json"));
        assert!(store.get_encrypted_keys("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_file_garbage_is_a_parse_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "[not, an, object").unwrap();
        let store = JsonFileKeyStore::new(f.path());
        let err = store.get_encrypted_keys("alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
