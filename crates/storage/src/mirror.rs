use std::sync::Arc;

use linguify_core::model::{EntityKind, EntityRef, PendingSyncRequest, ProgressSnapshot, UpdateKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{self, CodecError, Validate};
use crate::keys;
use crate::repository::{KeyValueStore, StorageError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MirrorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Typed view over a `KeyValueStore` that never surfaces failures.
///
/// Write failures are logged and dropped; reads of missing or undecodable
/// values come back as `None`.
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn KeyValueStore>,
}

impl LocalMirror {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Encode and store `value` at `key`. Returns false if nothing was persisted.
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_write(key, value).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "mirror write failed; progress not persisted");
                false
            }
        }
    }

    /// # Errors
    ///
    /// Returns `MirrorError` if encoding or the backend write fails.
    pub async fn try_write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), MirrorError> {
        let raw = codec::encode(value)?;
        self.store.put(key, raw).await?;
        Ok(())
    }

    pub async fn read<T: DeserializeOwned + Validate>(&self, key: &str) -> Option<T> {
        match self.try_read(key).await {
            Ok(value) => value,
            Err(MirrorError::Codec(err)) => {
                debug!(key, error = %err, "discarding undecodable mirror value");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "mirror read failed");
                None
            }
        }
    }

    /// Like `read`, but reports why a present value could not be used.
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::Codec` for malformed or invalid values and
    /// `MirrorError::Storage` for backend failures.
    pub async fn try_read<T: DeserializeOwned + Validate>(
        &self,
        key: &str,
    ) -> Result<Option<T>, MirrorError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        Ok(Some(codec::decode(&raw)?))
    }

    /// Every decodable value under `prefix`. Order is unspecified.
    pub async fn scan_by_prefix<T: DeserializeOwned + Validate>(
        &self,
        prefix: &str,
    ) -> Vec<(String, T)> {
        let entries = match self.store.scan_prefix(prefix).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(prefix, error = %err, "mirror scan failed");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(key, raw)| match codec::decode(&raw) {
                Ok(value) => Some((key, value)),
                Err(err) => {
                    debug!(key = %key, error = %err, "skipping undecodable mirror value");
                    None
                }
            })
            .collect()
    }

    pub async fn remove(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "mirror remove failed");
                false
            }
        }
    }

    // ─── Snapshot Helpers ──────────────────────────────────────────────────

    pub async fn snapshot(&self, entity: EntityRef) -> Option<ProgressSnapshot> {
        self.read(&keys::snapshot_key(entity)).await
    }

    pub async fn put_snapshot(&self, snapshot: &ProgressSnapshot) -> bool {
        self.write(&keys::snapshot_key(snapshot.entity), snapshot).await
    }

    pub async fn snapshots_of_kind(&self, kind: EntityKind) -> Vec<ProgressSnapshot> {
        self.scan_by_prefix::<ProgressSnapshot>(&keys::snapshot_prefix(kind))
            .await
            .into_iter()
            .map(|(_, snap)| snap)
            .collect()
    }

    // ─── Queue Helpers ─────────────────────────────────────────────────────

    /// The stored queue for `kind`; a corrupt queue reads as empty.
    pub async fn pending(&self, kind: UpdateKind) -> Vec<PendingSyncRequest> {
        self.read(&keys::pending_queue_key(kind))
            .await
            .unwrap_or_default()
    }

    /// Replace the stored queue for `kind`. An empty queue removes the key.
    pub async fn put_pending(&self, kind: UpdateKind, queue: &[PendingSyncRequest]) -> bool {
        let key = keys::pending_queue_key(kind);
        if queue.is_empty() {
            return self.remove(&key).await;
        }
        self.write(&key, queue).await
    }
}
