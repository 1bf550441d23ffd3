//! Parent roll-up math for the course hierarchy.
//!
//! A parent's percentage is the rounded mean of its children; its completion
//! flag is true only when every child is completed. A parent whose children
//! are all completed reports 100 regardless of the stored child percentages.

use crate::model::Percentage;

/// One child's contribution to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildProgress {
    pub percentage: Percentage,
    pub is_completed: bool,
}

impl ChildProgress {
    #[must_use]
    pub fn new(percentage: Percentage, is_completed: bool) -> Self {
        Self {
            percentage,
            is_completed,
        }
    }
}

/// Computed parent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub percentage: Percentage,
    pub is_completed: bool,
    /// Number of children in the denominator, including expected-but-missing ones.
    pub child_count: usize,
}

/// Aggregates children into a parent state.
///
/// `expected_children` is the number of children the caller knows the parent
/// has. Children not present in `children` count as 0% and incomplete.
/// Returns `None` when there is nothing to aggregate.
#[must_use]
pub fn aggregate_children(
    children: &[ChildProgress],
    expected_children: Option<usize>,
) -> Option<Aggregate> {
    let count = children.len().max(expected_children.unwrap_or(0));
    if count == 0 {
        return None;
    }

    let sum: u64 = children
        .iter()
        .map(|c| u64::from(c.percentage.value()))
        .sum();
    let all_complete = children.len() == count && children.iter().all(|c| c.is_completed);

    let percentage = if all_complete {
        Percentage::FULL
    } else {
        Percentage::saturating(u32::try_from(rounded_mean(sum, count as u64)).unwrap_or(100))
    };

    Some(Aggregate {
        percentage,
        is_completed: all_complete,
        child_count: count,
    })
}

/// Mean rounded half-up, matching `Math.round` for non-negative inputs.
fn rounded_mean(sum: u64, count: u64) -> u64 {
    (sum * 2 + count) / (count * 2)
}
