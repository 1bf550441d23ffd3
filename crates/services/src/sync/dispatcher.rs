use std::sync::Arc;

use linguify_core::Clock;
use linguify_core::model::{
    EntityRef, PayloadError, PendingSyncRequest, ProgressPayload, UpdateKind,
};
use storage::LocalMirror;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::error::SubmitError;
use crate::sync::api::ProgressApi;
use crate::sync::queue::PendingQueue;

const NOTICE_CAPACITY: usize = 32;

/// Result of `SyncDispatcher::submit_update`. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Synced { attempts: u32 },
    Queued { request_id: Uuid, reason: String },
    /// The payload can never be accepted; it was not queued.
    Discarded(PayloadError),
    /// The entity has no remote endpoint.
    LocalOnly,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Counters for one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub attempted: usize,
    pub synced: usize,
    pub requeued: usize,
    pub dropped: usize,
}

/// Soft, dismissable notifications for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// The network was unreachable; the update will be retried later.
    Offline { entity: EntityRef },
    /// The backend refused the update; it is queued for replay.
    Rejected { entity: EntityRef, message: String },
    ReplayFinished(ReplayReport),
}

/// Queue sizes, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub content: usize,
    pub lesson: usize,
}

impl PendingCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.content + self.lesson
    }
}

/// Pushes progress to the backend with bounded retries and queues what fails.
#[derive(Clone)]
pub struct SyncDispatcher {
    api: Arc<dyn ProgressApi>,
    mirror: LocalMirror,
    queue: PendingQueue,
    retry: RetryPolicy,
    max_replay_attempts: u32,
    clock: Clock,
    notices: broadcast::Sender<SyncNotice>,
    replay_lock: Arc<Mutex<()>>,
}

impl SyncDispatcher {
    #[must_use]
    pub fn new(
        api: Arc<dyn ProgressApi>,
        mirror: LocalMirror,
        retry: RetryPolicy,
        max_replay_attempts: u32,
        clock: Clock,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            api,
            queue: PendingQueue::new(mirror.clone()),
            mirror,
            retry,
            max_replay_attempts,
            clock,
            notices,
            replay_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    pub async fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            content: self.queue.len(UpdateKind::Content).await,
            lesson: self.queue.len(UpdateKind::Lesson).await,
        }
    }

    /// Persist one update remotely, or queue it for replay.
    ///
    /// The remote response body is never merged into the local snapshot.
    pub async fn submit_update(&self, kind: UpdateKind, payload: ProgressPayload) -> SubmitOutcome {
        if let Err(err) = payload.validate_for(kind) {
            warn!(%kind, error = %err, "discarding unsendable progress update");
            return SubmitOutcome::Discarded(err);
        }
        let entity = payload.target(kind);

        match self.deliver(kind, &payload).await {
            Ok(attempts) => {
                self.mark_synced(entity).await;
                SubmitOutcome::Synced { attempts }
            }
            Err(err) => {
                let reason = err.to_string();
                let request = PendingSyncRequest::new(kind, payload, self.clock.now())
                    .with_error(reason.clone());
                let request_id = request.request_id;
                if !self.queue.enqueue(request).await {
                    warn!(%entity, "could not persist pending request; update lost for this session");
                }
                self.mark_failed(entity, &reason).await;
                self.notify_failure(entity, &err);
                info!(%entity, %request_id, error = %err, "progress update queued for replay");
                SubmitOutcome::Queued { request_id, reason }
            }
        }
    }

    /// Attempt every queued request once.
    ///
    /// Each request is dequeued, attempted, and re-enqueued at the back on
    /// failure with its attempt count bumped. Requests that have failed
    /// `max_replay_attempts` passes are dropped.
    pub async fn replay_pending(&self) -> ReplayReport {
        let _guard = self.replay_lock.lock().await;
        let mut report = ReplayReport::default();

        for kind in UpdateKind::ALL {
            // Entries re-enqueued during this pass land behind the budget.
            let budget = self.queue.len(kind).await;
            for _ in 0..budget {
                let Some(mut request) = self.queue.pop_front(kind).await else {
                    break;
                };
                report.attempted += 1;
                let entity = request.payload.target(kind);

                match self.deliver(kind, &request.payload).await {
                    Ok(_) => {
                        report.synced += 1;
                        self.mark_synced(entity).await;
                    }
                    Err(SubmitError::Disabled) => {
                        // Not a failure of the request; keep it as it was.
                        report.requeued += 1;
                        self.requeue(entity, request).await;
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        request.record_failure(reason.clone());
                        if request.attempts >= self.max_replay_attempts {
                            report.dropped += 1;
                            warn!(
                                %entity,
                                request_id = %request.request_id,
                                attempts = request.attempts,
                                error = %err,
                                "dropping pending request after repeated failures"
                            );
                        } else {
                            report.requeued += 1;
                            self.requeue(entity, request).await;
                        }
                        self.mark_failed(entity, &reason).await;
                    }
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                requeued = report.requeued,
                dropped = report.dropped,
                "replay pass finished"
            );
            let _ = self.notices.send(SyncNotice::ReplayFinished(report));
        }
        report
    }

    /// Returns the number of attempts used on success.
    async fn deliver(&self, kind: UpdateKind, payload: &ProgressPayload) -> Result<u32, SubmitError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.submit(kind, payload).await {
                Ok(()) => return Ok(attempt),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        %kind,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "progress submit failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn requeue(&self, entity: EntityRef, request: PendingSyncRequest) {
        let request_id = request.request_id;
        if !self.queue.enqueue(request).await {
            warn!(%entity, %request_id, "could not re-queue pending request; update lost");
        }
    }

    /// Clears the error flag unless another queued request still targets `entity`.
    async fn mark_synced(&self, entity: EntityRef) {
        if self.queue.has_pending_for(entity).await {
            debug!(%entity, "entity still has queued updates; error flag kept");
            return;
        }
        if let Some(mut snapshot) = self.mirror.snapshot(entity).await {
            if snapshot.clear_error() {
                self.mirror.put_snapshot(&snapshot).await;
            }
        }
    }

    async fn mark_failed(&self, entity: EntityRef, reason: &str) {
        if let Some(mut snapshot) = self.mirror.snapshot(entity).await {
            snapshot.flag_error(reason);
            self.mirror.put_snapshot(&snapshot).await;
        }
    }

    fn notify_failure(&self, entity: EntityRef, err: &SubmitError) {
        let notice = match err {
            SubmitError::Rejected { message, .. } => SyncNotice::Rejected {
                entity,
                message: message.clone(),
            },
            _ => SyncNotice::Offline { entity },
        };
        let _ = self.notices.send(notice);
    }
}
