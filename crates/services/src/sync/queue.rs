use std::sync::Arc;

use linguify_core::model::{EntityRef, PendingSyncRequest, UpdateKind};
use storage::LocalMirror;
use tokio::sync::Mutex;
use tracing::debug;

/// Persisted FIFO of requests awaiting replay, one list per `UpdateKind`.
///
/// Every operation is a read-modify-write of the whole list; the mutex keeps
/// those atomic with respect to each other within this process.
#[derive(Clone)]
pub struct PendingQueue {
    mirror: LocalMirror,
    lock: Arc<Mutex<()>>,
}

impl PendingQueue {
    #[must_use]
    pub fn new(mirror: LocalMirror) -> Self {
        Self {
            mirror,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append `request` unless one with the same id is already queued.
    /// Returns true if the queue now holds it durably.
    pub async fn enqueue(&self, request: PendingSyncRequest) -> bool {
        let _guard = self.lock.lock().await;
        let kind = request.kind;
        let mut queue = self.mirror.pending(kind).await;
        if queue.iter().any(|r| r.request_id == request.request_id) {
            debug!(request_id = %request.request_id, "request already queued");
            return true;
        }
        queue.push(request);
        self.mirror.put_pending(kind, &queue).await
    }

    /// Remove and return the oldest request of `kind`.
    pub async fn pop_front(&self, kind: UpdateKind) -> Option<PendingSyncRequest> {
        let _guard = self.lock.lock().await;
        let mut queue = self.mirror.pending(kind).await;
        if queue.is_empty() {
            return None;
        }
        let head = queue.remove(0);
        self.mirror.put_pending(kind, &queue).await;
        Some(head)
    }

    pub async fn len(&self, kind: UpdateKind) -> usize {
        let _guard = self.lock.lock().await;
        self.mirror.pending(kind).await.len()
    }

    pub async fn is_empty(&self) -> bool {
        let _guard = self.lock.lock().await;
        for kind in UpdateKind::ALL {
            if !self.mirror.pending(kind).await.is_empty() {
                return false;
            }
        }
        true
    }

    /// True if any queued request would update `entity`.
    pub async fn has_pending_for(&self, entity: EntityRef) -> bool {
        let _guard = self.lock.lock().await;
        for kind in UpdateKind::ALL {
            let queue = self.mirror.pending(kind).await;
            if queue.iter().any(|r| r.payload.target(r.kind) == entity) {
                return true;
            }
        }
        false
    }

    pub async fn list(&self, kind: UpdateKind) -> Vec<PendingSyncRequest> {
        let _guard = self.lock.lock().await;
        self.mirror.pending(kind).await
    }
}
