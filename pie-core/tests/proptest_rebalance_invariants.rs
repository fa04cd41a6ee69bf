//! Property-based invariant tests for the rebalancer and group mutations.
//!
//! 1. An unlocked edit brings the group to exactly 100 whenever the locked
//!    items leave room for it.
//! 2. Locked items never move when a sibling is edited.
//! 3. A locked direct edit never exceeds what its siblings leave free, and
//!    nothing else changes.
//! 4. A fully locked group within 100 keeps its sum.
//! 5. A group of one always ends at 100.
//! 6. Re-applying the current value to a balanced group moves nothing beyond
//!    rounding.
//! 7. Removing an item from a balanced group with an unlocked survivor keeps
//!    it at 100.

use pie_core::mutations::remove_item;
use pie_core::tree::{total_target, Holding};
use pie_core::{rebalance, RebalanceOutcome};
use proptest::prelude::*;
use proptest::sample::Index;

// ── Helpers ─────────────────────────────────────────────────────────────

fn group_strategy(max_len: usize) -> impl Strategy<Value = Vec<Holding>> {
    proptest::collection::vec((0u8..=100, any::<bool>()), 2..=max_len).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (target, locked))| Holding {
                locked,
                ..Holding::new(format!("H{i}"), "", target)
            })
            .collect()
    })
}

fn locked_total(group: &[Holding]) -> u32 {
    group.iter().filter(|h| h.locked).map(|h| u32::from(h.target)).sum()
}

/// Scale the locked targets down so they fit in 100 together.
fn fit_locked(group: &mut [Holding]) {
    let total = locked_total(group);
    if total > 100 {
        for h in group.iter_mut().filter(|h| h.locked) {
            h.target = (u32::from(h.target) * 100 / total) as u8;
        }
    }
}

fn targets(group: &[Holding]) -> Vec<u8> {
    group.iter().map(|h| h.target).collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Unlocked edits
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unlocked_edit_sums_to_100(
        mut group in group_strategy(12),
        index in any::<Index>(),
        requested in -50i32..=200,
    ) {
        let i = index.index(group.len());
        group[i].locked = false;
        fit_locked(&mut group);

        let before = group.clone();
        rebalance(&mut group, i, requested);

        prop_assert_eq!(total_target(&group), 100, "before {:?}", targets(&before));
        for (old, new) in before.iter().zip(&group) {
            if old.locked {
                prop_assert_eq!(old.target, new.target);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Locked direct edits
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn locked_edit_is_capped_and_local(
        mut group in group_strategy(12),
        index in any::<Index>(),
        requested in -50i32..=200,
    ) {
        let i = index.index(group.len());
        group[i].locked = true;

        let before = group.clone();
        let others: u32 = total_target(&group) - u32::from(group[i].target);
        let outcome = rebalance(&mut group, i, requested);

        let cap = 100u32.saturating_sub(others);
        prop_assert!(u32::from(group[i].target) <= cap);
        prop_assert_eq!(outcome, RebalanceOutcome::LockedCapped { target: group[i].target });
        for (j, (old, new)) in before.iter().zip(&group).enumerate() {
            if j != i {
                prop_assert_eq!(old.target, new.target);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4-5. Degenerate groups
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fully_locked_group_keeps_its_sum(
        mut group in group_strategy(8),
        index in any::<Index>(),
    ) {
        for h in &mut group {
            h.locked = true;
        }
        fit_locked(&mut group);
        let i = index.index(group.len());
        let current = i32::from(group[i].target);
        let before = targets(&group);

        rebalance(&mut group, i, current);
        prop_assert_eq!(targets(&group), before);
    }

    #[test]
    fn single_item_is_always_100(target in 0u8..=100, locked in any::<bool>(), requested in -50i32..=200) {
        let mut group = vec![Holding { locked, ..Holding::new("Only", "", target) }];
        rebalance(&mut group, 0, requested);
        prop_assert_eq!(group[0].target, 100);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reapplying_current_value_is_stable(
        mut group in group_strategy(10),
        first in any::<Index>(),
        second in any::<Index>(),
        requested in 0i32..=100,
    ) {
        for h in &mut group {
            h.locked = false;
        }
        let i = first.index(group.len());
        rebalance(&mut group, i, requested);
        let balanced = targets(&group);

        let j = second.index(group.len());
        let current = i32::from(group[j].target);
        rebalance(&mut group, j, current);

        let drift: u32 = balanced
            .iter()
            .zip(&group)
            .map(|(a, h)| u32::from(a.abs_diff(h.target)))
            .sum();
        prop_assert_eq!(total_target(&group), 100);
        prop_assert!(drift <= group.len() as u32, "drift {} from {:?}", drift, balanced);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Removal
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn removal_keeps_unlocked_group_balanced(
        mut group in group_strategy(10),
        seed in any::<Index>(),
        victim in any::<Index>(),
    ) {
        for h in &mut group {
            h.locked = false;
        }
        let s = seed.index(group.len());
        let current = i32::from(group[s].target);
        rebalance(&mut group, s, current);
        prop_assert_eq!(total_target(&group), 100);

        let v = victim.index(group.len());
        remove_item(&mut group, v);
        prop_assert_eq!(total_target(&group), 100);
    }
}
