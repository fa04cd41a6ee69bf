//! Lock-Aware Rebalancer.
//!
//! Restores the sum-to-100 invariant of one sibling group after a single
//! item's target is edited.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ edit(i, v)                                                       │
//! │   ├─ group empty        → nothing                                │
//! │   ├─ group of one       → item = 100                             │
//! │   ├─ item i locked      → i = min(v, 100 - Σothers), rest as is  │
//! │   └─ item i unlocked    → i = min(v, 100 - Σlocked)              │
//! │        sharers (unlocked, ≠ i) take 100 - Σlocked - i,           │
//! │        in proportion to their previous targets                   │
//! │        (equal split when they were all at 0)                     │
//! │   round half away from zero, then push the rounding error onto   │
//! │   the largest sharer (or onto i when nobody shares)              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locked items are never moved by a sibling's edit. A group made only of
//! locked items, or whose locked items already exceed 100, is left off-balance
//! rather than silently unlocked.

use tracing::{debug, warn};

use crate::tree::{clamp_percent, Allocation, FULL_ALLOCATION};

const FULL: f64 = FULL_ALLOCATION as f64;

/// What a rebalance call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceOutcome {
    /// Group was empty.
    Empty,
    /// Lone item forced to 100.
    Single,
    /// Locked item moved directly, capped at what its siblings leave free.
    LockedCapped { target: u8 },
    /// Unlocked edit redistributed across the sharers.
    Redistributed {
        /// Target the edited item ended with.
        target: u8,
        /// Rounding error pushed onto sharers (or the edited item).
        correction: i64,
    },
}

/// Rebalance `group` after the item at `changed_index` is set to `new_target`.
///
/// `new_target` is clamped into `0..=100` first.
///
/// # Panics
///
/// Panics if `changed_index` is out of bounds for a group of two or more,
/// like slice indexing. Path-addressed callers check bounds beforehand.
pub fn rebalance<T: Allocation>(
    group: &mut [T],
    changed_index: usize,
    new_target: i32,
) -> RebalanceOutcome {
    match group.len() {
        0 => return RebalanceOutcome::Empty,
        1 => {
            group[0].set_target(FULL_ALLOCATION);
            return RebalanceOutcome::Single;
        }
        _ => {}
    }

    let requested = clamp_percent(f64::from(new_target));

    if group[changed_index].is_locked() {
        return move_locked(group, changed_index, requested);
    }

    let locked_total: u32 = group
        .iter()
        .filter(|item| item.is_locked())
        .map(|item| u32::from(item.target()))
        .sum();

    // Unlocked items other than the edited one, in stored order.
    let sharers: Vec<usize> = group
        .iter()
        .enumerate()
        .filter(|(i, item)| *i != changed_index && !item.is_locked())
        .map(|(i, _)| i)
        .collect();

    let max_target = u32::from(FULL_ALLOCATION).saturating_sub(locked_total);
    let changed_target = u32::from(requested).min(max_target);

    let mut working: Vec<f64> = group.iter().map(|item| f64::from(item.target())).collect();
    working[changed_index] = f64::from(changed_target);

    if !sharers.is_empty() {
        let required = FULL - f64::from(locked_total) - f64::from(changed_target);
        let original_total: u32 = sharers
            .iter()
            .map(|&i| u32::from(group[i].target()))
            .sum();

        if original_total == 0 {
            let share = required / sharers.len() as f64;
            for &i in &sharers {
                working[i] = share.max(0.0);
            }
        } else {
            for &i in &sharers {
                let ratio = f64::from(group[i].target()) / f64::from(original_total);
                working[i] = (ratio * required).max(0.0);
            }
        }
    }

    let mut rounded: Vec<i64> = working.iter().map(|v| v.round() as i64).collect();
    let error = i64::from(FULL_ALLOCATION) - rounded.iter().sum::<i64>();

    if error != 0 {
        let absorbers = if sharers.is_empty() {
            vec![changed_index]
        } else {
            sharers.clone()
        };
        let residual = absorb_error(&mut rounded, &absorbers, error);
        if residual != 0 {
            warn!(
                group_size = group.len(),
                locked_total,
                residual,
                "Locked items leave no room to reach 100%"
            );
        }
    }

    for (item, value) in group.iter_mut().zip(&rounded) {
        item.set_target(clamp_percent(*value as f64));
    }

    let target = group[changed_index].target();
    debug!(
        group_size = group.len(),
        changed_index,
        requested,
        target,
        sharers = sharers.len(),
        locked_total,
        correction = error,
        "Rebalanced sibling group"
    );

    RebalanceOutcome::Redistributed {
        target,
        correction: error,
    }
}

/// Direct edit of a locked item: capped by the rest of the group, which is
/// left untouched.
fn move_locked<T: Allocation>(group: &mut [T], index: usize, requested: u8) -> RebalanceOutcome {
    let sum_of_others: u32 = group
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, item)| u32::from(item.target()))
        .sum();

    let max_allowed = u32::from(FULL_ALLOCATION).saturating_sub(sum_of_others);
    let target = u32::from(requested).min(max_allowed) as u8;
    group[index].set_target(target);

    debug!(
        group_size = group.len(),
        changed_index = index,
        requested,
        target,
        sum_of_others,
        "Moved locked item"
    );

    RebalanceOutcome::LockedCapped { target }
}

/// Index of the first candidate holding the largest value.
pub(crate) fn first_largest(values: &[i64], candidates: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &i in candidates {
        match best {
            Some(b) if values[i] <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Push `error` onto the largest candidate, floored at 0.
///
/// When the floor swallows part of a negative error, the rest moves on to the
/// next largest candidate. Returns whatever could not be placed.
pub(crate) fn absorb_error(values: &mut [i64], candidates: &[usize], mut error: i64) -> i64 {
    if error > 0 {
        if let Some(i) = first_largest(values, candidates) {
            values[i] += error;
            return 0;
        }
        return error;
    }

    while error < 0 {
        let positive: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| values[i] > 0)
            .collect();
        let Some(i) = first_largest(values, &positive) else {
            break;
        };
        let take = values[i].min(-error);
        values[i] -= take;
        error += take;
    }
    error
}
