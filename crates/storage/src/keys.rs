//! Key layout of the mirror namespace.

use linguify_core::model::{EntityKind, EntityRef, UpdateKind};

const NAMESPACE: &str = "linguify";

/// Key of one entity's snapshot, e.g. `linguify:progress:lesson:7`.
#[must_use]
pub fn snapshot_key(entity: EntityRef) -> String {
    format!("{}{}", snapshot_prefix(entity.kind), entity.id)
}

/// Prefix shared by every snapshot of `kind`.
#[must_use]
pub fn snapshot_prefix(kind: EntityKind) -> String {
    format!("{NAMESPACE}:progress:{}:", kind.as_str())
}

/// Key holding the pending queue for `kind`.
#[must_use]
pub fn pending_queue_key(kind: UpdateKind) -> String {
    format!("{NAMESPACE}:pending:{}", kind.as_str())
}
