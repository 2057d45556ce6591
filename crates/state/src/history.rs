// Path: crates/state/src/history.rs

//! A bounded, height-indexed undo log.
//!
//! Changes are applied the moment they are appended and collected as *pending*
//! until [`History::commit`] seals them into the frame for a block height.
//! [`History::rollback_to`] inverts frames newest-first (and records inside a
//! frame last-first) until the target height is reached. Only the newest
//! `capacity` frames are retained; once a frame falls out of the window the
//! ledger can no longer reach below its height.

use crgov_types::error::HistoryError;
use std::collections::VecDeque;

/// A change record that can be applied to, and reverted from, a target.
///
/// `revert` must restore the target exactly as it was before `apply`.
pub trait Reversible<T: ?Sized> {
    /// Applies the change.
    fn apply(&self, target: &mut T);
    /// Inverts the change.
    fn revert(&self, target: &mut T);
}

#[derive(Debug, Clone)]
struct Frame<C> {
    height: u32,
    changes: Vec<C>,
}

/// A height-indexed undo log over change records of type `C`.
#[derive(Debug, Clone)]
pub struct History<C> {
    capacity: usize,
    frames: VecDeque<Frame<C>>,
    pending: Vec<C>,
    pending_height: Option<u32>,
    floor: u32,
    tip: Option<u32>,
}

impl<C> History<C> {
    /// Creates an empty log retaining at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: VecDeque::new(),
            pending: Vec::new(),
            pending_height: None,
            floor: 0,
            tip: None,
        }
    }

    /// Applies `change` to `target` and records it as pending at `height`.
    pub fn append<T: ?Sized>(&mut self, target: &mut T, height: u32, change: C)
    where
        C: Reversible<T>,
    {
        change.apply(target);
        if let Some(prev) = self.pending_height {
            if prev != height {
                log::warn!(
                    "[History] Pending records span heights {} and {}; sealing them together.",
                    prev,
                    height
                );
            }
        }
        self.pending_height = Some(height);
        self.pending.push(change);
    }

    /// Seals all pending records as the frame for `height`.
    ///
    /// An empty frame is still recorded so that the retained window is measured
    /// in heights, not in non-empty blocks.
    pub fn commit(&mut self, height: u32) -> Result<(), HistoryError> {
        if let Some(tip) = self.tip {
            if height <= tip {
                return Err(HistoryError::NonMonotonicCommit { height, tip });
            }
        }
        let changes = std::mem::take(&mut self.pending);
        self.pending_height = None;
        self.frames.push_back(Frame { height, changes });
        self.tip = Some(height);

        while self.frames.len() > self.capacity {
            if let Some(dropped) = self.frames.pop_front() {
                self.floor = dropped.height;
            }
        }
        Ok(())
    }

    /// Reverts every record newer than `height`, including all pending records.
    ///
    /// Returns the number of reverted records. Fails without touching the target
    /// when `height` lies below the retained floor.
    pub fn rollback_to<T: ?Sized>(&mut self, target: &mut T, height: u32) -> Result<usize, HistoryError>
    where
        C: Reversible<T>,
    {
        self.ensure_reachable(height)?;

        let mut reverted = 0usize;
        for change in self.pending.drain(..).rev() {
            change.revert(target);
            reverted += 1;
        }
        self.pending_height = None;

        while self.frames.back().map_or(false, |f| f.height > height) {
            if let Some(frame) = self.frames.pop_back() {
                for change in frame.changes.iter().rev() {
                    change.revert(target);
                }
                reverted += frame.changes.len();
            }
        }

        if self.tip.map_or(false, |tip| tip > height) {
            self.tip = Some(height);
        }
        Ok(reverted)
    }

    /// Fails with `RollbackOutOfRange` if `height` cannot be reconstructed.
    pub fn ensure_reachable(&self, height: u32) -> Result<(), HistoryError> {
        if height < self.floor {
            return Err(HistoryError::RollbackOutOfRange {
                requested: height,
                floor: self.floor,
            });
        }
        Ok(())
    }

    /// Forgets every frame and pending record without reverting anything and
    /// moves both floor and tip to `height`.
    ///
    /// Used after the target has been replaced wholesale from a checkpoint.
    pub fn rollback_seek_to(&mut self, height: u32) {
        self.frames.clear();
        self.pending.clear();
        self.pending_height = None;
        self.floor = height;
        self.tip = Some(height);
    }

    /// The most recently committed height.
    pub fn tip(&self) -> Option<u32> {
        self.tip
    }

    /// The oldest height that can still be rolled back to.
    pub fn floor(&self) -> u32 {
        self.floor
    }

    /// Number of retained frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame is retained.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of records appended since the last commit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Maximum number of retained frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::MapChange;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    type Ledger = History<MapChange<u8, u32>>;

    fn put(history: &mut Ledger, map: &mut BTreeMap<u8, u32>, height: u32, key: u8, value: u32) {
        let change = MapChange::insert(map, key, value);
        history.append(map, height, change);
    }

    #[test]
    fn rollback_reverts_newer_frames_and_pending() {
        let mut map = BTreeMap::new();
        let mut history = Ledger::new(10);

        put(&mut history, &mut map, 1, 1, 10);
        history.commit(1).unwrap();
        put(&mut history, &mut map, 2, 1, 20);
        put(&mut history, &mut map, 2, 2, 5);
        history.commit(2).unwrap();
        put(&mut history, &mut map, 3, 3, 7);

        let reverted = history.rollback_to(&mut map, 1).unwrap();
        assert_eq!(reverted, 3);
        assert_eq!(map, BTreeMap::from([(1, 10)]));
        assert_eq!(history.tip(), Some(1));
        assert_eq!(history.pending_len(), 0);

        // Heights continue from the new tip.
        put(&mut history, &mut map, 2, 9, 9);
        history.commit(2).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn commit_requires_increasing_heights_and_records_empty_frames() {
        let mut history = Ledger::new(10);
        history.commit(5).unwrap();
        history.commit(6).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.commit(6),
            Err(HistoryError::NonMonotonicCommit { height: 6, tip: 6 })
        );
    }

    #[test]
    fn pruning_raises_the_floor() {
        let mut map = BTreeMap::new();
        let mut history = Ledger::new(3);
        for h in 1..=5u32 {
            put(&mut history, &mut map, h, h as u8, h);
            history.commit(h).unwrap();
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.floor(), 2);
        assert_eq!(
            history.rollback_to(&mut map, 1),
            Err(HistoryError::RollbackOutOfRange {
                requested: 1,
                floor: 2
            })
        );
        // The failed call left everything in place.
        assert_eq!(map.len(), 5);

        history.rollback_to(&mut map, 2).unwrap();
        assert_eq!(map, BTreeMap::from([(1, 1), (2, 2)]));
    }

    #[test]
    fn rollback_at_or_above_tip_only_drops_pending() {
        let mut map = BTreeMap::new();
        let mut history = Ledger::new(4);
        put(&mut history, &mut map, 1, 1, 1);
        history.commit(1).unwrap();
        assert_eq!(history.rollback_to(&mut map, 7).unwrap(), 0);
        assert_eq!(history.tip(), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn seek_discards_without_reverting() {
        let mut map = BTreeMap::new();
        let mut history = Ledger::new(4);
        put(&mut history, &mut map, 1, 1, 1);
        history.commit(1).unwrap();
        history.rollback_seek_to(720);
        assert_eq!(map.len(), 1);
        assert_eq!(history.tip(), Some(720));
        assert_eq!(history.floor(), 720);
        assert!(history.is_empty());
        assert!(history.rollback_to(&mut map, 719).is_err());
        history.commit(721).unwrap();
    }

    proptest! {
        #[test]
        fn rollback_restores_every_committed_snapshot(
            blocks in prop::collection::vec(
                prop::collection::vec((0u8..8, 0u32..1000, any::<bool>()), 0..6),
                1..20,
            ),
            target_seed in any::<u32>(),
        ) {
            let mut map: BTreeMap<u8, u32> = BTreeMap::new();
            let mut history = Ledger::new(64);
            let mut snapshots = vec![(0u32, map.clone())];

            for (i, ops) in blocks.iter().enumerate() {
                let height = i as u32 + 1;
                for (key, value, delete) in ops {
                    let change = if *delete {
                        MapChange::remove(&map, *key)
                    } else {
                        MapChange::insert(&map, *key, *value)
                    };
                    history.append(&mut map, height, change);
                }
                history.commit(height).unwrap();
                snapshots.push((height, map.clone()));
            }

            let idx = (target_seed as usize) % snapshots.len();
            let (target, expected) = snapshots[idx].clone();
            history.rollback_to(&mut map, target).unwrap();
            prop_assert_eq!(map, expected);
        }
    }
}
