use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a trackable entity, unique within its `EntityKind`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Entity Kinds ──────────────────────────────────────────────────────────────

/// Tier of the course hierarchy: unit → lesson → content lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A single piece of lesson content; the leaf tier.
    ContentLesson,
    Lesson,
    Unit,
}

impl EntityKind {
    /// The kind one tier up, or `None` for a unit.
    #[must_use]
    pub fn parent_kind(self) -> Option<Self> {
        match self {
            Self::ContentLesson => Some(Self::Lesson),
            Self::Lesson => Some(Self::Unit),
            Self::Unit => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentLesson => "content_lesson",
            Self::Lesson => "lesson",
            Self::Unit => "unit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind-qualified entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    #[must_use]
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub fn content_lesson(id: u64) -> Self {
        Self::new(EntityKind::ContentLesson, EntityId::new(id))
    }

    #[must_use]
    pub fn lesson(id: u64) -> Self {
        Self::new(EntityKind::Lesson, EntityId::new(id))
    }

    #[must_use]
    pub fn unit(id: u64) -> Self {
        Self::new(EntityKind::Unit, EntityId::new(id))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ids and kinds from strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for EntityId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(EntityId::new)
            .map_err(|_| ParseIdError {
                kind: "EntityId".to_string(),
            })
    }
}

impl FromStr for EntityKind {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content_lesson" | "content" => Ok(Self::ContentLesson),
            "lesson" => Ok(Self::Lesson),
            "unit" => Ok(Self::Unit),
            _ => Err(ParseIdError {
                kind: "EntityKind".to_string(),
            }),
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_display_and_parse() {
        let id: EntityId = "123".parse().unwrap();
        assert_eq!(id, EntityId::new(123));
        assert_eq!(id.to_string(), "123");
    }

    #[test]
    fn entity_id_from_str_invalid() {
        assert!("not-a-number".parse::<EntityId>().is_err());
        assert!("-4".parse::<EntityId>().is_err());
    }

    #[test]
    fn hierarchy_has_three_tiers() {
        assert_eq!(EntityKind::ContentLesson.parent_kind(), Some(EntityKind::Lesson));
        assert_eq!(EntityKind::Lesson.parent_kind(), Some(EntityKind::Unit));
        assert_eq!(EntityKind::Unit.parent_kind(), None);
    }

    #[test]
    fn kind_parses_short_alias() {
        assert_eq!("content".parse::<EntityKind>().unwrap(), EntityKind::ContentLesson);
        assert_eq!("unit".parse::<EntityKind>().unwrap(), EntityKind::Unit);
        assert!("course".parse::<EntityKind>().is_err());
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::lesson(7).to_string(), "lesson:7");
    }
}
