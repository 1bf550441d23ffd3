use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::mirror::LocalMirror;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Raw string key-value persistence, one namespace per browser profile.
///
/// `put` must be atomic: on failure the previous value at `key` is left
/// untouched. `scan_prefix` returns entries in the backend's insertion order,
/// which callers must not rely on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` at `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn put(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Fetch the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// List every entry whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;

    /// Delete the value at `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
struct InMemoryInner {
    entries: HashMap<String, (u64, String)>,
    next_seq: u64,
    used_bytes: usize,
    quota: Option<usize>,
}

/// In-memory store with an optional byte quota, for tests and ephemeral profiles.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<InMemoryInner>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values exceed `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        let store = Self::new();
        store.set_quota(Some(quota));
        store
    }

    pub fn set_quota(&self, quota: Option<usize>) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.quota = quota;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a raw value, bypassing the quota. Used to plant corrupt data.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            let seq = guard.next_seq;
            guard.next_seq += 1;
            guard.used_bytes += key.len() + value.len();
            if let Some((_, old)) = guard.entries.insert(key.to_string(), (seq, value.to_string())) {
                guard.used_bytes -= key.len() + old.len();
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let old_len = guard
            .entries
            .get(key)
            .map_or(0, |(_, old)| key.len() + old.len());
        let needed = guard.used_bytes - old_len + key.len() + value.len();
        if let Some(quota) = guard.quota {
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        let existing_seq = guard.entries.get(key).map(|(seq, _)| *seq);
        let seq = match existing_seq {
            Some(seq) => seq,
            None => {
                let seq = guard.next_seq;
                guard.next_seq += 1;
                seq
            }
        };
        guard.entries.insert(key.to_string(), (seq, value));
        guard.used_bytes = needed;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.entries.get(key).map(|(_, v)| v.clone()))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let guard = self
            .inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<(u64, String, String)> = guard
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (seq, v))| (*seq, k.clone(), v.clone()))
            .collect();
        found.sort_by_key(|(seq, _, _)| *seq);
        Ok(found.into_iter().map(|(_, k, v)| (k, v)).collect())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some((_, old)) = guard.entries.remove(key) {
            guard.used_bytes -= key.len() + old.len();
        }
        Ok(())
    }
}

/// Bundles the active key-value backend for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryStore::new()),
        }
    }

    #[must_use]
    pub fn mirror(&self) -> LocalMirror {
        LocalMirror::new(Arc::clone(&self.kv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrites_keep_insertion_position() {
        let store = InMemoryStore::new();
        store.put("p:1", "a".into()).await.unwrap();
        store.put("p:2", "b".into()).await.unwrap();
        store.put("q:1", "c".into()).await.unwrap();
        store.put("p:1", "z".into()).await.unwrap();

        let scanned = store.scan_prefix("p:").await.unwrap();
        assert_eq!(
            scanned,
            vec![("p:1".to_string(), "z".to_string()), ("p:2".to_string(), "b".to_string())]
        );
    }

    #[tokio::test]
    async fn quota_rejects_without_partial_write() {
        let store = InMemoryStore::with_quota(16);
        store.put("k", "0123456789".into()).await.unwrap();

        let err = store.put("k", "0123456789abcdefgh".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 16, .. }));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("0123456789"));
    }

    #[tokio::test]
    async fn replacing_a_value_frees_its_old_bytes() {
        let store = InMemoryStore::with_quota(12);
        store.put("k", "0123456789".into()).await.unwrap();
        store.put("k", "abcdefghij".into()).await.unwrap();
        store.remove("k").await.unwrap();
        store.put("j", "0123456789".into()).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = InMemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        store.remove("nope").await.unwrap();
        assert!(store.is_empty());
    }
}
