use linguify_core::Clock;
use linguify_core::model::{
    EntityId, EntityKind, EntityRef, PayloadError, Percentage, ProgressPayload, ProgressSnapshot,
    UpdateKind,
};
use storage::LocalMirror;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cascade_service::{CascadeCalculator, CascadeContext, CascadeOutcome};
use crate::sync::{PendingCounts, SubmitOutcome, SyncDispatcher, SyncNotice};

const UPDATE_CAPACITY: usize = 64;

/// A learner's progress on one entity, as reported by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub entity: EntityRef,
    /// Owning lesson for a content lesson, owning unit for a lesson.
    pub parent_id: Option<EntityId>,
    /// Owning unit for a content lesson. Ignored for other kinds.
    pub grandparent_id: Option<EntityId>,
    pub percentage: Percentage,
    pub completed: bool,
    /// Seconds spent since the last update.
    pub time_spent: u64,
    pub xp_earned: Option<u32>,
    /// Number of children `parent_id` has, when the caller knows it.
    pub expected_siblings: Option<usize>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(entity: EntityRef, percentage: Percentage, completed: bool) -> Self {
        Self {
            entity,
            parent_id: None,
            grandparent_id: None,
            percentage,
            completed,
            time_spent: 0,
            xp_earned: None,
            expected_siblings: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_grandparent(mut self, grandparent_id: EntityId) -> Self {
        self.grandparent_id = Some(grandparent_id);
        self
    }

    #[must_use]
    pub fn with_time_spent(mut self, seconds: u64) -> Self {
        self.time_spent = seconds;
        self
    }

    #[must_use]
    pub fn with_xp(mut self, xp: u32) -> Self {
        self.xp_earned = Some(xp);
        self
    }

    #[must_use]
    pub fn with_expected_siblings(mut self, count: usize) -> Self {
        self.expected_siblings = Some(count);
        self
    }
}

/// Snapshots that changed locally, leaf first. Published before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub written: Vec<ProgressSnapshot>,
}

impl From<CascadeOutcome> for SnapshotUpdate {
    fn from(outcome: CascadeOutcome) -> Self {
        let mut written = Vec::with_capacity(outcome.ancestors.len() + 1);
        written.push(outcome.leaf);
        written.extend(outcome.ancestors);
        Self { written }
    }
}

impl SnapshotUpdate {
    #[must_use]
    pub fn get(&self, entity: EntityRef) -> Option<&ProgressSnapshot> {
        self.written.iter().find(|s| s.entity == entity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub update: SnapshotUpdate,
    pub sync: SubmitOutcome,
}

/// How server-provided snapshots are folded into the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Local snapshots are authoritative; server state only fills gaps.
    #[default]
    LocalWins,
    /// Server snapshots overwrite local ones and re-run the cascade.
    PreferServer,
}

/// Entry point for recording learner progress.
///
/// Local state is updated first so the UI can render optimistically; the
/// remote write follows and never fails the call.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    mirror: LocalMirror,
    cascade: CascadeCalculator,
    dispatcher: SyncDispatcher,
    language_code: String,
    policy: ReconcilePolicy,
    updates: broadcast::Sender<SnapshotUpdate>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        mirror: LocalMirror,
        dispatcher: SyncDispatcher,
        language_code: impl Into<String>,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            cascade: CascadeCalculator::new(clock, mirror.clone()),
            clock,
            mirror,
            dispatcher,
            language_code: language_code.into(),
            policy: ReconcilePolicy::default(),
            updates,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotUpdate> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.dispatcher.subscribe_notices()
    }

    pub async fn snapshot(&self, entity: EntityRef) -> Option<ProgressSnapshot> {
        self.mirror.snapshot(entity).await
    }

    pub async fn pending_counts(&self) -> PendingCounts {
        self.dispatcher.pending_counts().await
    }

    /// Record progress locally, cascade it to ancestors, then sync it.
    pub async fn record_progress(&self, update: ProgressUpdate) -> RecordOutcome {
        let mut leaf = ProgressSnapshot::new(
            update.entity,
            update.parent_id,
            update.percentage,
            update.completed,
            self.clock.now(),
        );
        // An earlier failed sync stays flagged until this one succeeds.
        leaf.error = self
            .mirror
            .snapshot(update.entity)
            .await
            .and_then(|s| s.error);

        let context = CascadeContext {
            grandparent_id: update.grandparent_id,
            expected_siblings: update.expected_siblings,
            expected_parent_siblings: None,
        };
        let snapshots = SnapshotUpdate::from(self.cascade.apply(leaf, &context).await);
        let _ = self.updates.send(snapshots.clone());

        let sync = match self.payload_for(&update) {
            Ok(Some((kind, payload))) => self.dispatcher.submit_update(kind, payload).await,
            Ok(None) => SubmitOutcome::LocalOnly,
            Err(err) => {
                debug!(entity = %update.entity, error = %err, "progress kept local only");
                SubmitOutcome::Discarded(err)
            }
        };

        RecordOutcome {
            update: snapshots,
            sync,
        }
    }

    /// Fold a server-provided snapshot into the mirror according to the policy.
    /// Returns true if local state changed.
    pub async fn reconcile(&self, mut server: ProgressSnapshot) -> bool {
        let local = self.mirror.snapshot(server.entity).await;
        let overwrite = match (&local, self.policy) {
            (None, _) => true,
            (Some(_), ReconcilePolicy::LocalWins) => false,
            (Some(local), ReconcilePolicy::PreferServer) => {
                local.completion_percentage != server.completion_percentage
                    || local.is_completed != server.is_completed
                    || local.parent_id != server.parent_id
            }
        };
        if !overwrite {
            debug!(entity = %server.entity, policy = ?self.policy, "server snapshot ignored");
            return false;
        }

        let entity = server.entity;
        server.error = local.and_then(|s| s.error);
        let snapshots = SnapshotUpdate::from(
            self.cascade
                .apply(server, &CascadeContext::default())
                .await,
        );
        let _ = self.updates.send(snapshots);
        info!(%entity, policy = ?self.policy, "server snapshot applied locally");
        true
    }

    fn payload_for(
        &self,
        update: &ProgressUpdate,
    ) -> Result<Option<(UpdateKind, ProgressPayload)>, PayloadError> {
        let (kind, content_lesson_id, lesson_id) = match update.entity.kind {
            EntityKind::ContentLesson => {
                let lesson_id = update.parent_id.ok_or(PayloadError::MissingLessonId)?;
                (UpdateKind::Content, Some(update.entity.id), lesson_id)
            }
            EntityKind::Lesson => (UpdateKind::Lesson, None, update.entity.id),
            EntityKind::Unit => return Ok(None),
        };
        Ok(Some((
            kind,
            ProgressPayload {
                content_lesson_id,
                lesson_id,
                completion_percentage: update.percentage,
                time_spent: update.time_spent,
                xp_earned: update.xp_earned,
                mark_completed: update.completed,
                language_code: self.language_code.clone(),
            },
        )))
    }
}
