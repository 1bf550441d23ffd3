use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{EntityId, EntityRef};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PercentageError {
    #[error("completion percentage must be between 0 and 100, got {0}")]
    OutOfRange(u32),
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// A completion percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// # Errors
    ///
    /// Returns `PercentageError::OutOfRange` for values above 100.
    pub fn new(value: u32) -> Result<Self, PercentageError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(PercentageError::OutOfRange(value))
    }

    /// Clamps any value into range. Used for untrusted UI input.
    #[must_use]
    pub fn saturating(value: u32) -> Self {
        Self(u8::try_from(value.min(100)).unwrap_or(100))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 == 100
    }
}

impl TryFrom<u32> for Percentage {
    type Error = PercentageError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u32 {
    fn from(value: Percentage) -> Self {
        u32::from(value.0)
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Marker left on a snapshot whose remote write failed and was queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFault {
    pub message: String,
}

/// Locally mirrored progress for one entity.
///
/// `is_completed` is stored independently of `completion_percentage`; the two
/// may disagree transiently. `timestamp` is informational only and plays no
/// part in conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub entity: EntityRef,
    pub parent_id: Option<EntityId>,
    pub completion_percentage: Percentage,
    pub is_completed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SnapshotFault>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new(
        entity: EntityRef,
        parent_id: Option<EntityId>,
        completion_percentage: Percentage,
        is_completed: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            parent_id,
            completion_percentage,
            is_completed,
            timestamp,
            error: None,
        }
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn flag_error(&mut self, message: impl Into<String>) {
        self.error = Some(SnapshotFault {
            message: message.into(),
        });
    }

    /// Returns true if a flag was present.
    pub fn clear_error(&mut self) -> bool {
        self.error.take().is_some()
    }
}
