//! Membership diff: desired state vs current state → minimal delta.
//!
//! Pure and total. Empty inputs are valid and produce an empty diff. Output
//! order follows the key ordering of the inputs, so commands derived from a
//! diff come out in a stable order.

use std::collections::{BTreeMap, BTreeSet};

/// The three-way split between a desired and a current membership set, plus
/// the retained members whose attributes changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff<K, A = ()> {
  /// `desired − current`, with the desired attributes.
  pub additions: BTreeMap<K, A>,
  /// `current − desired`, with the attributes being dropped.
  pub removals:  BTreeMap<K, A>,
  /// `desired ∩ current`.
  pub retained:  BTreeSet<K>,
  /// Retained members whose attributes differ, with the desired attributes.
  pub updates:   BTreeMap<K, A>,
}

impl<K: Ord, A> MembershipDiff<K, A> {
  /// `true` when applying the diff would change nothing.
  pub fn is_empty(&self) -> bool {
    self.additions.is_empty() && self.removals.is_empty() && self.updates.is_empty()
  }
}

/// Diff two attributed membership maps.
pub fn diff_maps<K, A>(
  desired: &BTreeMap<K, A>,
  current: &BTreeMap<K, A>,
) -> MembershipDiff<K, A>
where
  K: Ord + Clone,
  A: Clone + PartialEq,
{
  let mut additions = BTreeMap::new();
  let mut retained = BTreeSet::new();
  let mut updates = BTreeMap::new();

  for (key, wanted) in desired {
    match current.get(key) {
      None => {
        additions.insert(key.clone(), wanted.clone());
      }
      Some(existing) => {
        retained.insert(key.clone());
        if existing != wanted {
          updates.insert(key.clone(), wanted.clone());
        }
      }
    }
  }

  let removals = current
    .iter()
    .filter(|(key, _)| !desired.contains_key(*key))
    .map(|(key, attrs)| (key.clone(), attrs.clone()))
    .collect();

  MembershipDiff { additions, removals, retained, updates }
}

/// Diff two plain membership sets. `updates` is always empty.
pub fn diff_sets<K: Ord + Clone>(
  desired: &BTreeSet<K>,
  current: &BTreeSet<K>,
) -> MembershipDiff<K> {
  MembershipDiff {
    additions: desired.difference(current).map(|k| (k.clone(), ())).collect(),
    removals:  current.difference(desired).map(|k| (k.clone(), ())).collect(),
    retained:  desired.intersection(current).cloned().collect(),
    updates:   BTreeMap::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn set(items: &[i64]) -> BTreeSet<i64> { items.iter().copied().collect() }

  /// Every subset of {1, 2, 3, 4}.
  fn subsets() -> Vec<BTreeSet<i64>> {
    (0u8..16)
      .map(|mask| {
        (0u8..4)
          .filter(|bit| mask & (1u8 << bit) != 0)
          .map(|bit| i64::from(bit) + 1)
          .collect()
      })
      .collect()
  }

  #[test]
  fn empty_inputs_yield_empty_diff() {
    let d = diff_sets::<i64>(&BTreeSet::new(), &BTreeSet::new());
    assert!(d.is_empty());
    assert!(d.retained.is_empty());
  }

  #[test]
  fn splits_additions_removals_and_retained() {
    let d = diff_sets(&set(&[1, 2, 3]), &set(&[2, 3, 4]));
    assert_eq!(d.additions.keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(d.removals.keys().copied().collect::<Vec<_>>(), vec![4]);
    assert_eq!(d.retained, set(&[2, 3]));
  }

  #[test]
  fn set_diff_is_complete_for_all_small_inputs() {
    for desired in subsets() {
      for current in subsets() {
        let d = diff_sets(&desired, &current);
        let additions: BTreeSet<i64> = d.additions.keys().copied().collect();
        let removals: BTreeSet<i64> = d.removals.keys().copied().collect();

        let added_or_kept: BTreeSet<i64> = additions.union(&d.retained).copied().collect();
        let removed_or_kept: BTreeSet<i64> = removals.union(&d.retained).copied().collect();

        assert_eq!(added_or_kept, desired);
        assert_eq!(removed_or_kept, current);
        assert!(additions.is_disjoint(&removals));
        assert_eq!(d.is_empty(), desired == current);
      }
    }
  }

  #[test]
  fn attribute_change_is_an_update_not_add_remove() {
    let desired = BTreeMap::from([(1, true), (2, false)]);
    let current = BTreeMap::from([(1, false), (2, false)]);

    let d = diff_maps(&desired, &current);
    assert!(d.additions.is_empty());
    assert!(d.removals.is_empty());
    assert_eq!(d.updates, BTreeMap::from([(1, true)]));
    assert_eq!(d.retained.len(), 2);
  }

  #[test]
  fn removals_keep_current_attributes() {
    let desired = BTreeMap::new();
    let current = BTreeMap::from([(7, true)]);

    let d = diff_maps(&desired, &current);
    assert_eq!(d.removals, BTreeMap::from([(7, true)]));
    assert!(!d.is_empty());
  }
}
