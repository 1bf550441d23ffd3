use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{EntityId, EntityKind, EntityRef};
use crate::model::snapshot::Percentage;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("content progress requires a content lesson id")]
    MissingContentLessonId,

    #[error("content progress requires the id of its lesson")]
    MissingLessonId,

    #[error("language code cannot be empty")]
    EmptyLanguageCode,
}

//
// ─── UPDATE KIND ───────────────────────────────────────────────────────────────
//

/// Which progress endpoint an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Content,
    Lesson,
}

impl UpdateKind {
    pub const ALL: [Self; 2] = [Self::Content, Self::Lesson];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Lesson => "lesson",
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

/// Request body sent to the progress endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_lesson_id: Option<EntityId>,
    pub lesson_id: EntityId,
    pub completion_percentage: Percentage,
    /// Seconds spent on the entity.
    pub time_spent: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_earned: Option<u32>,
    pub mark_completed: bool,
    pub language_code: String,
}

impl ProgressPayload {
    /// # Errors
    ///
    /// Returns `PayloadError` if the payload cannot be sent as `kind`.
    pub fn validate_for(&self, kind: UpdateKind) -> Result<(), PayloadError> {
        if kind == UpdateKind::Content && self.content_lesson_id.is_none() {
            return Err(PayloadError::MissingContentLessonId);
        }
        if self.language_code.trim().is_empty() {
            return Err(PayloadError::EmptyLanguageCode);
        }
        Ok(())
    }

    /// The entity whose local snapshot reflects this payload.
    #[must_use]
    pub fn target(&self, kind: UpdateKind) -> EntityRef {
        match (kind, self.content_lesson_id) {
            (UpdateKind::Content, Some(id)) => EntityRef::new(EntityKind::ContentLesson, id),
            _ => EntityRef::new(EntityKind::Lesson, self.lesson_id),
        }
    }
}

//
// ─── PENDING REQUEST ───────────────────────────────────────────────────────────
//

/// A remote write waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSyncRequest {
    pub request_id: Uuid,
    pub kind: UpdateKind,
    pub payload: ProgressPayload,
    /// Replay passes this request has already failed.
    #[serde(default)]
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingSyncRequest {
    #[must_use]
    pub fn new(kind: UpdateKind, payload: ProgressPayload, queued_at: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            kind,
            payload,
            attempts: 0,
            queued_at,
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(message.into());
        self
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(message.into());
    }
}
