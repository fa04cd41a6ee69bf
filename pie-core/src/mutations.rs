//! Group Mutation Operations.
//!
//! Structural edits to a sibling group. Each one leaves the group balanced
//! through the rebalancer, except where locked items make that impossible.

use tracing::{debug, info};

use crate::rebalance::{first_largest, rebalance};
use crate::tree::{clamp_percent, Allocation, Holding, FULL_ALLOCATION};

/// Append `item` seeded at `seed` and carve its share out of the siblings.
///
/// Returns the new item's index.
pub fn add_item<T: Allocation>(group: &mut Vec<T>, mut item: T, seed: u8) -> usize {
    item.set_target(seed.min(FULL_ALLOCATION));
    group.push(item);

    let index = group.len() - 1;
    rebalance(group, index, i32::from(seed));

    info!(
        index,
        seed,
        target = group[index].target(),
        group_size = group.len(),
        "Added item"
    );
    index
}

/// Remove the item at `index` and hand its target to the remaining unlocked
/// items.
///
/// The freed share is split equally (not proportionally), then the group is
/// rebalanced from its largest unlocked item to clean up rounding. With no
/// unlocked items left the group keeps whatever sum the locked items have.
///
/// # Panics
///
/// Panics if `index` is out of bounds.
pub fn remove_item<T: Allocation>(group: &mut Vec<T>, index: usize) -> T {
    let removed = group.remove(index);
    let freed = removed.target();

    let unlocked: Vec<usize> = group
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_locked())
        .map(|(i, _)| i)
        .collect();

    if unlocked.is_empty() {
        info!(
            index,
            freed,
            remaining = group.len(),
            "Removed item; no unlocked sibling to take its share"
        );
        return removed;
    }

    let share = f64::from(freed) / unlocked.len() as f64;
    for &i in &unlocked {
        let grown = f64::from(group[i].target()) + share;
        group[i].set_target(clamp_percent(grown));
    }

    let values: Vec<i64> = group.iter().map(|item| i64::from(item.target())).collect();
    if let Some(anchor) = first_largest(&values, &unlocked) {
        let current = group[anchor].target();
        rebalance(group, anchor, i32::from(current));
    }

    info!(
        index,
        freed,
        unlocked = unlocked.len(),
        remaining = group.len(),
        "Removed item"
    );
    removed
}

/// Flip the lock on the item at `index`. Returns the new lock state.
///
/// Unlocking re-runs the rebalancer with the item's own target, since its
/// freed capacity may have to be reconciled with the siblings. Locking
/// changes nothing else.
pub fn toggle_lock<T: Allocation>(group: &mut [T], index: usize) -> bool {
    let locked = !group[index].is_locked();
    group[index].set_locked(locked);

    if !locked {
        let current = group[index].target();
        rebalance(group, index, i32::from(current));
    }

    debug!(index, locked, "Toggled lock");
    locked
}

/// Give every holding the same share, rounding remainder on the first one.
///
/// Locks are ignored. This is the bulk-import shortcut, not a rebalance.
pub fn split_equally(holdings: &mut [Holding]) {
    if holdings.is_empty() {
        return;
    }

    let share = (f64::from(FULL_ALLOCATION) / holdings.len() as f64).round() as i64;
    let mut values = vec![share; holdings.len()];
    let error = i64::from(FULL_ALLOCATION) - values.iter().sum::<i64>();

    // All values are equal, so the first largest is the first holding.
    let everyone: Vec<usize> = (0..values.len()).collect();
    crate::rebalance::absorb_error(&mut values, &everyone, error);

    for (holding, value) in holdings.iter_mut().zip(values) {
        holding.target = clamp_percent(value as f64);
    }

    debug!(holdings = holdings.len(), share, error, "Split pie equally");
}
