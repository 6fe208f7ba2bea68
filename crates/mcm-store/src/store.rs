use std::fmt;

use tracing::{debug, info};

use mcm_types::{ModelObject, ObjectKind, ReindexingLedger, UNASSIGNED};

use crate::error::{StoreError, StoreResult};

/// Arena of model objects of one concrete type.
///
/// Objects are held in slot order. The object's index is its slot handle and
/// stays stable across additions and deprecations; only
/// [`compact_and_reindex`](Self::compact_and_reindex) moves objects.
pub struct IndexedStore<T> {
    objects: Vec<T>,
    /// One past the highest index ever assigned since the last compaction.
    next_index: i32,
}

impl<T: ModelObject> IndexedStore<T> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            next_index: 0,
        }
    }

    /// Number of slots, deprecated ones included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the store holds no slots.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of non-deprecated objects.
    pub fn live_count(&self) -> usize {
        self.objects.iter().filter(|o| !o.is_deprecated()).count()
    }

    /// Number of deprecated objects awaiting compaction.
    pub fn deprecated_count(&self) -> usize {
        self.objects.len() - self.live_count()
    }

    /// The index the next appended object will receive.
    pub fn next_index(&self) -> i32 {
        self.next_index
    }

    /// Look up the object occupying `index`, deprecated or not.
    pub fn get(&self, index: i32) -> Option<&T> {
        let position = self.position_of(index)?;
        self.objects.get(position)
    }

    /// Mutable access to the object occupying `index`.
    pub fn get_mut(&mut self, index: i32) -> Option<&mut T> {
        let position = self.position_of(index)?;
        self.objects.get_mut(position)
    }

    /// Iterate all slots in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.objects.iter()
    }

    /// Mutable iteration over all slots in order.
    ///
    /// Callers may change object content and embedded references but must
    /// leave the header index alone.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.objects.iter_mut()
    }

    /// Iterate non-deprecated objects in slot order.
    pub fn iter_live(&self) -> impl Iterator<Item = &T> + '_ {
        self.objects.iter().filter(|o| !o.is_deprecated())
    }

    /// Find a non-deprecated object by its key.
    pub fn find_by_key(&self, key: &str) -> Option<&T> {
        self.iter_live().find(|o| o.key() == Some(key))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.objects
    }

    /// Remove every slot. Indices restart at zero.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.next_index = 0;
    }

    // -----------------------------------------------------------------------
    // Addition
    // -----------------------------------------------------------------------

    /// Assign each object the next index after the current maximum and append
    /// it. Returns the assigned indices in input order.
    pub fn index_and_append<I>(&mut self, objects: I) -> Vec<i32>
    where
        I: IntoIterator<Item = T>,
    {
        let mut assigned = Vec::new();
        for mut object in objects {
            let index = self.next_index;
            object.set_index(index);
            object.restore();
            self.objects.push(object);
            self.next_index += 1;
            assigned.push(index);
        }
        if !assigned.is_empty() {
            debug!(kind = %T::kind(), count = assigned.len(), "objects appended");
        }
        assigned
    }

    /// Place each object into the first deprecated slot, keeping that slot's
    /// index, or append it with a new index when no deprecated slot is left.
    /// Returns the assigned indices in input order.
    pub fn index_and_append_reusing_deprecated<I>(&mut self, objects: I) -> Vec<i32>
    where
        I: IntoIterator<Item = T>,
    {
        // Slots before the last reused one hold no deprecated objects.
        let mut from = 0;
        objects
            .into_iter()
            .map(|object| {
                let position = self.insert_from(from, object);
                from = position + 1;
                self.objects[position].index()
            })
            .collect()
    }

    /// Append one object with the next index and return it as stored.
    pub fn append(&mut self, object: T) -> &T {
        let position = self.push_next(object);
        &self.objects[position]
    }

    /// Place one object into the first deprecated slot, or append it when
    /// there is none, and return it as stored.
    pub fn insert_reusing_deprecated(&mut self, object: T) -> &T {
        let position = self.insert_from(0, object);
        &self.objects[position]
    }

    /// Undo the insertion of the object now at `index`.
    ///
    /// `previous` is the deprecated object the insertion overwrote, or `None`
    /// if the object was appended, in which case it must still be the last
    /// slot. Returns the removed object.
    pub fn revert_insert(&mut self, index: i32, previous: Option<T>) -> StoreResult<T> {
        match previous {
            Some(previous) => {
                let slot = self.slot_mut(index)?;
                Ok(std::mem::replace(slot, previous))
            }
            None => {
                let last = self.objects.last().map(|o| o.index());
                if last != Some(index) {
                    return Err(StoreError::IndexOutOfRange {
                        kind: T::kind(),
                        index,
                        len: self.objects.len(),
                    });
                }
                let object = self.objects.pop().ok_or(StoreError::IndexOutOfRange {
                    kind: T::kind(),
                    index,
                    len: 0,
                })?;
                self.next_index = index;
                debug!(kind = %T::kind(), index, "append reverted");
                Ok(object)
            }
        }
    }

    fn push_next(&mut self, mut object: T) -> usize {
        let index = self.next_index;
        object.set_index(index);
        object.restore();
        self.objects.push(object);
        self.next_index += 1;
        debug!(kind = %T::kind(), index, "object appended");
        self.objects.len() - 1
    }

    /// Reuse the first deprecated slot at or after `from`, else append.
    /// Returns the position written.
    fn insert_from(&mut self, from: usize, mut object: T) -> usize {
        let reusable = self.objects[from.min(self.objects.len())..]
            .iter()
            .position(|o| o.is_deprecated())
            .map(|offset| from + offset);
        match reusable {
            Some(position) => {
                let index = self.objects[position].index();
                object.set_index(index);
                object.restore();
                self.objects[position] = object;
                debug!(kind = %T::kind(), index, "deprecated slot reused");
                position
            }
            None => self.push_next(object),
        }
    }

    // -----------------------------------------------------------------------
    // Deprecation
    // -----------------------------------------------------------------------

    /// Lazily deprecate every non-deprecated object matching `predicate`.
    ///
    /// Objects are deprecated as the returned iterator advances, and each one
    /// is yielded once deprecated. Dropping the iterator early leaves the
    /// remaining matches untouched; calling again starts a new pass.
    pub fn deprecate_where<F>(&mut self, predicate: F) -> DeprecateWhere<'_, T, F>
    where
        F: FnMut(&T) -> bool,
    {
        DeprecateWhere {
            iter: self.objects.iter_mut(),
            predicate,
        }
    }

    /// Deprecate the object at `index` unless it is listed in `restricted`.
    ///
    /// Returns `true` if the flag changed, `false` if the object was already
    /// deprecated.
    pub fn deprecate(&mut self, index: i32, restricted: &[i32]) -> StoreResult<bool> {
        if restricted.contains(&index) {
            return Err(StoreError::ProtectedIndex {
                kind: T::kind(),
                index,
            });
        }
        let object = self.slot_mut(index)?;
        let changed = !object.is_deprecated();
        object.deprecate();
        Ok(changed)
    }

    /// Clear the deprecation flag of the object at `index`.
    pub fn restore(&mut self, index: i32) -> StoreResult<()> {
        self.slot_mut(index)?.restore();
        Ok(())
    }

    /// Copy the content of `replacement` into the object at `index` and
    /// restore it. Index and key of the slot are kept.
    pub fn replace(&mut self, index: i32, replacement: &T) -> StoreResult<()> {
        let object = self.slot_mut(index)?;
        object.populate_from(replacement);
        object.restore();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Compaction
    // -----------------------------------------------------------------------

    /// Remove every object matching `predicate` and reassign `0..N` to the
    /// survivors in their original order.
    ///
    /// The returned ledger holds one entry per pre-compaction slot. The
    /// predicate is evaluated for all slots before anything is mutated, so a
    /// panicking predicate leaves the store untouched.
    pub fn compact_and_reindex<F>(&mut self, mut predicate: F) -> ReindexingLedger
    where
        F: FnMut(&T) -> bool,
    {
        let doomed: Vec<bool> = self.objects.iter().map(|o| predicate(o)).collect();
        let mut ledger = ReindexingLedger::with_capacity(self.objects.len());
        let mut survivors = Vec::with_capacity(self.objects.len());
        let mut next = 0;

        for (mut object, remove) in std::mem::take(&mut self.objects).into_iter().zip(doomed) {
            if remove {
                ledger.push(object.index(), UNASSIGNED);
                object.set_index(UNASSIGNED);
            } else {
                ledger.push(object.index(), next);
                object.set_index(next);
                survivors.push(object);
                next += 1;
            }
        }
        self.objects = survivors;
        self.next_index = next;

        let removed = ledger.removed_count();
        if removed > 0 {
            info!(kind = %T::kind(), removed, remaining = next, "store compacted");
        } else {
            debug!(kind = %T::kind(), slots = ledger.len(), "compaction removed nothing");
        }
        ledger
    }

    /// Remove all deprecated objects. See [`compact_and_reindex`](Self::compact_and_reindex).
    pub fn compact_deprecated(&mut self) -> ReindexingLedger {
        self.compact_and_reindex(|o| o.is_deprecated())
    }

    fn position_of(&self, index: i32) -> Option<usize> {
        if index < 0 {
            return None;
        }
        match self.objects.get(index as usize) {
            Some(object) if object.index() == index => Some(index as usize),
            _ => self.objects.iter().position(|o| o.index() == index),
        }
    }

    fn slot_mut(&mut self, index: i32) -> StoreResult<&mut T> {
        let len = self.objects.len();
        match self.position_of(index) {
            Some(position) => Ok(&mut self.objects[position]),
            None => Err(StoreError::IndexOutOfRange {
                kind: T::kind(),
                index,
                len,
            }),
        }
    }
}

impl<T: ModelObject> Default for IndexedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ModelObject> FromIterator<T> for IndexedStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut store = Self::new();
        store.index_and_append(iter);
        store
    }
}

impl<T: ModelObject> fmt::Debug for IndexedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStore")
            .field("kind", &ObjectKind::of::<T>())
            .field("slots", &self.objects.len())
            .field("deprecated", &self.deprecated_count())
            .finish()
    }
}

/// Lazy deprecation pass returned by [`IndexedStore::deprecate_where`].
#[must_use = "objects are only deprecated as the iterator is consumed"]
pub struct DeprecateWhere<'a, T, F> {
    iter: std::slice::IterMut<'a, T>,
    predicate: F,
}

impl<'a, T, F> Iterator for DeprecateWhere<'a, T, F>
where
    T: ModelObject,
    F: FnMut(&T) -> bool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        for object in self.iter.by_ref() {
            if !object.is_deprecated() && (self.predicate)(object) {
                object.deprecate();
                return Some(object);
            }
        }
        None
    }
}
