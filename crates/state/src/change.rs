// Path: crates/state/src/change.rs

//! Generic reversible change records over ordered maps, sets and plain values.
//!
//! A record stores both the prior and the resulting value, so applying and
//! reverting are pure assignments. Owners wrap these in their own tagged enums
//! to say which field of their state a record targets.

use crate::history::Reversible;
use std::collections::{BTreeMap, BTreeSet};

/// Replaces the entry at `key`. `None` on either side means "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapChange<K, V> {
    /// The affected key.
    pub key: K,
    /// The entry before the change.
    pub before: Option<V>,
    /// The entry after the change.
    pub after: Option<V>,
}

impl<K: Ord + Clone, V: Clone> MapChange<K, V> {
    /// A change that sets `key` to `value`, capturing the current entry of `map`.
    pub fn insert(map: &BTreeMap<K, V>, key: K, value: V) -> Self {
        Self {
            before: map.get(&key).cloned(),
            after: Some(value),
            key,
        }
    }

    /// A change that removes `key`, capturing the current entry of `map`.
    pub fn remove(map: &BTreeMap<K, V>, key: K) -> Self {
        Self {
            before: map.get(&key).cloned(),
            after: None,
            key,
        }
    }

    /// True when the change would not alter the map.
    pub fn is_noop(&self) -> bool
    where
        V: PartialEq,
    {
        self.before == self.after
    }

    /// Writes `after` into `map`.
    pub fn apply_to(&self, map: &mut BTreeMap<K, V>) {
        write_entry(map, &self.key, self.after.as_ref());
    }

    /// Writes `before` back into `map`.
    pub fn revert_from(&self, map: &mut BTreeMap<K, V>) {
        write_entry(map, &self.key, self.before.as_ref());
    }
}

fn write_entry<K: Ord + Clone, V: Clone>(map: &mut BTreeMap<K, V>, key: &K, value: Option<&V>) {
    match value {
        Some(v) => {
            map.insert(key.clone(), v.clone());
        }
        None => {
            map.remove(key);
        }
    }
}

impl<K: Ord + Clone, V: Clone> Reversible<BTreeMap<K, V>> for MapChange<K, V> {
    fn apply(&self, target: &mut BTreeMap<K, V>) {
        self.apply_to(target);
    }
    fn revert(&self, target: &mut BTreeMap<K, V>) {
        self.revert_from(target);
    }
}

/// Adds or removes one member of an ordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetChange<T> {
    /// The affected member.
    pub item: T,
    /// Membership before the change.
    pub was_present: bool,
    /// Membership after the change.
    pub present: bool,
}

impl<T: Ord + Clone> SetChange<T> {
    /// A change that inserts `item`.
    pub fn insert(set: &BTreeSet<T>, item: T) -> Self {
        Self {
            was_present: set.contains(&item),
            present: true,
            item,
        }
    }

    /// A change that removes `item`.
    pub fn remove(set: &BTreeSet<T>, item: T) -> Self {
        Self {
            was_present: set.contains(&item),
            present: false,
            item,
        }
    }

    /// Applies the resulting membership.
    pub fn apply_to(&self, set: &mut BTreeSet<T>) {
        write_member(set, &self.item, self.present);
    }

    /// Restores the prior membership.
    pub fn revert_from(&self, set: &mut BTreeSet<T>) {
        write_member(set, &self.item, self.was_present);
    }
}

fn write_member<T: Ord + Clone>(set: &mut BTreeSet<T>, item: &T, present: bool) {
    if present {
        set.insert(item.clone());
    } else {
        set.remove(item);
    }
}

impl<T: Ord + Clone> Reversible<BTreeSet<T>> for SetChange<T> {
    fn apply(&self, target: &mut BTreeSet<T>) {
        self.apply_to(target);
    }
    fn revert(&self, target: &mut BTreeSet<T>) {
        self.revert_from(target);
    }
}

/// Replaces a whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChange<T> {
    /// The value before the change.
    pub before: T,
    /// The value after the change.
    pub after: T,
}

impl<T: Clone> ValueChange<T> {
    /// A change from the current value of `slot` to `after`.
    pub fn new(slot: &T, after: T) -> Self {
        Self {
            before: slot.clone(),
            after,
        }
    }

    /// Writes `after` into `slot`.
    pub fn apply_to(&self, slot: &mut T) {
        *slot = self.after.clone();
    }

    /// Writes `before` back into `slot`.
    pub fn revert_from(&self, slot: &mut T) {
        *slot = self.before.clone();
    }
}

impl<T: Clone> Reversible<T> for ValueChange<T> {
    fn apply(&self, target: &mut T) {
        self.apply_to(target);
    }
    fn revert(&self, target: &mut T) {
        self.revert_from(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_change_restores_absent_and_present_entries() {
        let mut map = BTreeMap::from([(1u8, "a")]);
        let overwrite = MapChange::insert(&map, 1, "b");
        let create = MapChange::insert(&map, 2, "c");
        overwrite.apply_to(&mut map);
        create.apply_to(&mut map);
        assert_eq!(map, BTreeMap::from([(1, "b"), (2, "c")]));

        create.revert_from(&mut map);
        overwrite.revert_from(&mut map);
        assert_eq!(map, BTreeMap::from([(1, "a")]));
        assert!(MapChange::insert(&map, 1, "a").is_noop());
    }

    #[test]
    fn set_change_remove_of_missing_member_is_inert() {
        let mut set = BTreeSet::from([1u8]);
        let change = SetChange::remove(&set, 9);
        change.apply_to(&mut set);
        change.revert_from(&mut set);
        assert_eq!(set, BTreeSet::from([1]));
    }
}
