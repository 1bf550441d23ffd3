mod ids;
mod payload;
mod snapshot;

pub use ids::{EntityId, EntityKind, EntityRef, ParseIdError};
pub use payload::{PayloadError, PendingSyncRequest, ProgressPayload, UpdateKind};
pub use snapshot::{Percentage, PercentageError, ProgressSnapshot, SnapshotFault};
