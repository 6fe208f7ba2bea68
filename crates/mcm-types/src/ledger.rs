//! Old-to-new index mapping produced by a compaction pass.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::UNASSIGNED;

/// One pre-compaction slot: its old index and the index it was moved to.
///
/// `new == -1` means the object was removed and every reference to it must be
/// invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReindexEntry {
    pub old: i32,
    pub new: i32,
}

impl ReindexEntry {
    pub fn new(old: i32, new: i32) -> Self {
        Self { old, new }
    }

    /// Returns `true` if the slot was removed by the compaction.
    pub fn is_removed(&self) -> bool {
        self.new == UNASSIGNED
    }

    /// Returns `true` if the slot kept its index.
    pub fn is_unchanged(&self) -> bool {
        self.old == self.new
    }
}

/// Ordered sequence of [`ReindexEntry`] values, one per pre-compaction slot
/// in original slot order.
///
/// A ledger is created once per compaction call, consumed immediately by all
/// dependent stores, then discarded. An identity ledger and an empty ledger
/// are both valid "nothing moved" answers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexingLedger {
    entries: Vec<ReindexEntry>,
}

impl ReindexingLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty ledger with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// The identity mapping over `len` slots.
    pub fn identity(len: usize) -> Self {
        (0..len as i32).map(|i| (i, i)).collect()
    }

    /// Append the mapping of the next slot.
    pub fn push(&mut self, old: i32, new: i32) {
        self.entries.push(ReindexEntry::new(old, new));
    }

    pub fn entries(&self) -> &[ReindexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReindexEntry> {
        self.entries.iter()
    }

    /// Number of pre-compaction slots covered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if no slot moved and none was removed.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(ReindexEntry::is_unchanged)
    }

    /// The new index for `old`, `Some(-1)` if it was removed, or `None` if the
    /// ledger does not cover that index.
    pub fn lookup(&self, old: i32) -> Option<i32> {
        // Slots of a consistent store carry their own position as index.
        if old >= 0 {
            if let Some(entry) = self.entries.get(old as usize) {
                if entry.old == old {
                    return Some(entry.new);
                }
            }
        }
        self.entries.iter().find(|e| e.old == old).map(|e| e.new)
    }

    /// Old indices of all removed slots.
    pub fn removed(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.iter().filter(|e| e.is_removed()).map(|e| e.old)
    }

    /// Entries of all surviving slots.
    pub fn survivors(&self) -> impl Iterator<Item = &ReindexEntry> + '_ {
        self.entries.iter().filter(|e| !e.is_removed())
    }

    pub fn removed_count(&self) -> usize {
        self.removed().count()
    }

    /// Check that survivors are mapped onto `0..N` in slot order and that no
    /// old index appears twice.
    pub fn validate(&self) -> Result<(), TypeError> {
        let mut seen_old = HashSet::with_capacity(self.entries.len());
        let mut expected_new = 0;
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.old < 0 {
                return Err(TypeError::NegativeIndex(entry.old));
            }
            if !seen_old.insert(entry.old) {
                return Err(TypeError::RepeatedOldIndex {
                    position,
                    old: entry.old,
                });
            }
            if entry.is_removed() {
                continue;
            }
            if entry.new != expected_new {
                return Err(TypeError::NonContiguousNewIndex {
                    new: entry.new,
                    expected: expected_new,
                });
            }
            expected_new += 1;
        }
        Ok(())
    }
}

impl FromIterator<(i32, i32)> for ReindexingLedger {
    fn from_iter<I: IntoIterator<Item = (i32, i32)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(old, new)| ReindexEntry::new(old, new))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ReindexingLedger {
    type Item = &'a ReindexEntry;
    type IntoIter = std::slice::Iter<'a, ReindexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> ReindexingLedger {
        [(0, 0), (1, -1), (2, 1), (3, 2)].into_iter().collect()
    }

    #[test]
    fn identity_ledger() {
        let ledger = ReindexingLedger::identity(4);
        assert_eq!(ledger.len(), 4);
        assert!(ledger.is_identity());
        assert_eq!(ledger.removed_count(), 0);
        assert!(ledger.validate().is_ok());
    }

    #[test]
    fn empty_ledger_is_identity() {
        let ledger = ReindexingLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.is_identity());
        assert_eq!(ledger.lookup(0), None);
    }

    #[test]
    fn lookup_follows_mapping() {
        let ledger = sample();
        assert_eq!(ledger.lookup(0), Some(0));
        assert_eq!(ledger.lookup(1), Some(UNASSIGNED));
        assert_eq!(ledger.lookup(3), Some(2));
        assert_eq!(ledger.lookup(7), None);
        assert_eq!(ledger.lookup(-1), None);
        assert!(!ledger.is_identity());
    }

    #[test]
    fn lookup_handles_sparse_old_indices() {
        let ledger: ReindexingLedger = [(2, 0), (5, 1)].into_iter().collect();
        assert_eq!(ledger.lookup(5), Some(1));
        assert_eq!(ledger.lookup(0), None);
    }

    #[test]
    fn removed_and_survivors() {
        let ledger = sample();
        assert_eq!(ledger.removed().collect::<Vec<_>>(), vec![1]);
        let survivors: Vec<_> = ledger.survivors().map(|e| (e.old, e.new)).collect();
        assert_eq!(survivors, vec![(0, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn validate_rejects_gaps() {
        let ledger: ReindexingLedger = [(0, 0), (1, 2)].into_iter().collect();
        assert_eq!(
            ledger.validate(),
            Err(TypeError::NonContiguousNewIndex {
                new: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn validate_rejects_repeated_old_index() {
        let ledger: ReindexingLedger = [(0, 0), (0, 1)].into_iter().collect();
        assert!(ledger.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let ledger = sample();
        let json = serde_json::to_string(&ledger).unwrap();
        let back: ReindexingLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }

    proptest! {
        #[test]
        fn identity_lookup_is_identity(len in 0usize..200) {
            let ledger = ReindexingLedger::identity(len);
            for i in 0..len as i32 {
                prop_assert_eq!(ledger.lookup(i), Some(i));
            }
            prop_assert!(ledger.validate().is_ok());
        }
    }
}
