use linguify_core::Clock;
use linguify_core::aggregate::{ChildProgress, aggregate_children};
use linguify_core::model::{EntityId, EntityRef, ProgressSnapshot};
use storage::LocalMirror;
use tracing::debug;

/// The cascade walks at most leaf → parent → grandparent.
const MAX_LEVELS: usize = 2;

/// Caller-known facts about the hierarchy around a leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeContext {
    /// Parent of the leaf's parent; stored on the parent snapshot.
    pub grandparent_id: Option<EntityId>,
    /// Number of children the leaf's parent has, if known.
    pub expected_siblings: Option<usize>,
    /// Number of children the grandparent has, if known.
    pub expected_parent_siblings: Option<usize>,
}

/// Every snapshot written by one cascade, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub leaf: ProgressSnapshot,
    pub ancestors: Vec<ProgressSnapshot>,
}

impl CascadeOutcome {
    pub fn written(&self) -> impl Iterator<Item = &ProgressSnapshot> {
        std::iter::once(&self.leaf).chain(self.ancestors.iter())
    }

    #[must_use]
    pub fn ancestor(&self, entity: EntityRef) -> Option<&ProgressSnapshot> {
        self.ancestors.iter().find(|s| s.entity == entity)
    }
}

/// Recomputes parent aggregates in the local mirror after a leaf changes.
#[derive(Clone)]
pub struct CascadeCalculator {
    clock: Clock,
    mirror: LocalMirror,
}

impl CascadeCalculator {
    #[must_use]
    pub fn new(clock: Clock, mirror: LocalMirror) -> Self {
        Self { clock, mirror }
    }

    /// Write `leaf` and roll its progress up to its parent and grandparent.
    ///
    /// A level with no known children is left untouched, as is everything
    /// above it.
    pub async fn apply(&self, leaf: ProgressSnapshot, context: &CascadeContext) -> CascadeOutcome {
        self.mirror.put_snapshot(&leaf).await;

        let mut ancestors = Vec::new();
        let mut child = leaf.clone();
        for level in 0..MAX_LEVELS {
            let (Some(parent_kind), Some(parent_id)) = (child.entity.kind.parent_kind(), child.parent_id)
            else {
                break;
            };
            let parent_ref = EntityRef::new(parent_kind, parent_id);
            let expected = if level == 0 {
                context.expected_siblings
            } else {
                context.expected_parent_siblings
            };

            let children = self.siblings_of(&child).await;
            let Some(aggregate) = aggregate_children(&children, expected) else {
                debug!(parent = %parent_ref, "no children found; parent left as is");
                break;
            };

            let existing = self.mirror.snapshot(parent_ref).await;
            let grandparent_id = if parent_kind.parent_kind().is_none() {
                None
            } else if level == 0 {
                context
                    .grandparent_id
                    .or_else(|| existing.as_ref().and_then(|s| s.parent_id))
            } else {
                existing.as_ref().and_then(|s| s.parent_id)
            };

            let mut parent = ProgressSnapshot::new(
                parent_ref,
                grandparent_id,
                aggregate.percentage,
                aggregate.is_completed,
                self.clock.now(),
            );
            parent.error = existing.and_then(|s| s.error);

            self.mirror.put_snapshot(&parent).await;
            debug!(
                parent = %parent_ref,
                percentage = parent.completion_percentage.value(),
                completed = parent.is_completed,
                children = aggregate.child_count,
                "parent progress recomputed"
            );
            ancestors.push(parent.clone());
            child = parent;
        }

        CascadeOutcome { leaf, ancestors }
    }

    /// Children of `child`'s parent as currently mirrored, with `child` itself
    /// taken from memory so a failed local write still counts.
    async fn siblings_of(&self, child: &ProgressSnapshot) -> Vec<ChildProgress> {
        self.mirror
            .snapshots_of_kind(child.entity.kind)
            .await
            .into_iter()
            .filter(|s| s.parent_id == child.parent_id && s.entity != child.entity)
            .chain(std::iter::once(child.clone()))
            .map(|s| ChildProgress::new(s.completion_percentage, s.is_completed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linguify_core::model::Percentage;
    use linguify_core::time::fixed_clock;
    use storage::Storage;

    fn calculator() -> (CascadeCalculator, LocalMirror) {
        let mirror = Storage::in_memory().mirror();
        (CascadeCalculator::new(fixed_clock(), mirror.clone()), mirror)
    }

    fn content(id: u64, lesson: u64, pct: u32, done: bool) -> ProgressSnapshot {
        ProgressSnapshot::new(
            EntityRef::content_lesson(id),
            Some(EntityId::new(lesson)),
            Percentage::new(pct).unwrap(),
            done,
            fixed_clock().now(),
        )
    }

    fn unit_context(unit: u64) -> CascadeContext {
        CascadeContext {
            grandparent_id: Some(EntityId::new(unit)),
            ..CascadeContext::default()
        }
    }

    #[tokio::test]
    async fn three_siblings_average_to_eighty_three() {
        let (calc, mirror) = calculator();
        calc.apply(content(1, 10, 100, true), &CascadeContext::default()).await;
        calc.apply(content(2, 10, 100, true), &CascadeContext::default()).await;
        let outcome = calc.apply(content(3, 10, 50, false), &CascadeContext::default()).await;

        let lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        assert_eq!(lesson.completion_percentage.value(), 83);
        assert!(!lesson.is_completed);
        assert_eq!(outcome.ancestor(EntityRef::lesson(10)), Some(&lesson));
    }

    #[tokio::test]
    async fn explicit_incomplete_sibling_blocks_completion() {
        let (calc, mirror) = calculator();
        calc.apply(content(1, 10, 100, true), &CascadeContext::default()).await;
        calc.apply(content(2, 10, 100, false), &CascadeContext::default()).await;

        let lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        assert_eq!(lesson.completion_percentage.value(), 100);
        assert!(!lesson.is_completed);
    }

    #[tokio::test]
    async fn single_leaf_propagates_two_levels() {
        let (calc, mirror) = calculator();
        let outcome = calc.apply(content(1, 10, 50, false), &unit_context(7)).await;

        assert_eq!(outcome.ancestors.len(), 2);
        let lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        assert_eq!(lesson.completion_percentage.value(), 50);
        assert_eq!(lesson.parent_id, Some(EntityId::new(7)));
        let unit = mirror.snapshot(EntityRef::unit(7)).await.unwrap();
        assert_eq!(unit.completion_percentage.value(), 50);
        assert_eq!(unit.parent_id, None);
    }

    #[tokio::test]
    async fn grandparent_averages_lessons_not_leaves() {
        let (calc, mirror) = calculator();
        // Lesson 10 has two leaves, lesson 11 has one; unit 7 averages the lessons.
        calc.apply(content(1, 10, 100, true), &unit_context(7)).await;
        calc.apply(content(2, 10, 0, false), &unit_context(7)).await;
        calc.apply(content(3, 11, 100, true), &unit_context(7)).await;

        let unit = mirror.snapshot(EntityRef::unit(7)).await.unwrap();
        assert_eq!(unit.completion_percentage.value(), 75);
        assert!(!unit.is_completed);
    }

    #[tokio::test]
    async fn grandparent_id_is_remembered_on_parent() {
        let (calc, mirror) = calculator();
        calc.apply(content(1, 10, 20, false), &unit_context(7)).await;
        // Later writes without the unit id still reach the unit.
        calc.apply(content(2, 10, 80, false), &CascadeContext::default()).await;

        let unit = mirror.snapshot(EntityRef::unit(7)).await.unwrap();
        assert_eq!(unit.completion_percentage.value(), 50);
    }

    #[tokio::test]
    async fn leaf_without_parent_writes_only_itself() {
        let (calc, mirror) = calculator();
        let mut leaf = content(1, 10, 40, false);
        leaf.parent_id = None;
        let outcome = calc.apply(leaf, &CascadeContext::default()).await;

        assert!(outcome.ancestors.is_empty());
        assert!(mirror.snapshot(EntityRef::lesson(10)).await.is_none());
        assert!(mirror.snapshot(EntityRef::content_lesson(1)).await.is_some());
    }

    #[tokio::test]
    async fn expected_siblings_count_missing_as_zero() {
        let (calc, mirror) = calculator();
        let context = CascadeContext {
            expected_siblings: Some(4),
            ..CascadeContext::default()
        };
        calc.apply(content(1, 10, 100, true), &context).await;

        let lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        assert_eq!(lesson.completion_percentage.value(), 25);
        assert!(!lesson.is_completed);
    }

    #[tokio::test]
    async fn parent_error_flag_survives_recompute() {
        let (calc, mirror) = calculator();
        calc.apply(content(1, 10, 40, false), &CascadeContext::default()).await;
        let mut lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        lesson.flag_error("offline");
        mirror.put_snapshot(&lesson).await;

        calc.apply(content(1, 10, 60, false), &CascadeContext::default()).await;
        let lesson = mirror.snapshot(EntityRef::lesson(10)).await.unwrap();
        assert_eq!(lesson.completion_percentage.value(), 60);
        assert!(lesson.has_error());
    }

    #[tokio::test]
    async fn lesson_leaf_cascades_to_unit_only() {
        let (calc, mirror) = calculator();
        let lesson = ProgressSnapshot::new(
            EntityRef::lesson(10),
            Some(EntityId::new(7)),
            Percentage::new(30).unwrap(),
            false,
            fixed_clock().now(),
        );
        let outcome = calc.apply(lesson, &CascadeContext::default()).await;
        assert_eq!(outcome.ancestors.len(), 1);
        let unit = mirror.snapshot(EntityRef::unit(7)).await.unwrap();
        assert_eq!(unit.completion_percentage.value(), 30);
    }
}
