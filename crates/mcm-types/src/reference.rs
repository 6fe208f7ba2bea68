//! Typed index references embedded in model objects.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ledger::ReindexingLedger;
use crate::object::{ModelObject, UNASSIGNED};

/// A reference "index N into the store of `T`" held by another model object.
///
/// The target type is part of the reference so that the reference resolver
/// can enumerate every site pointing at a given store without scanning
/// arbitrary object graphs. Serializes as the bare index.
pub struct ObjectRef<T> {
    index: i32,
    _target: PhantomData<fn() -> T>,
}

/// What applying a ledger did to a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefUpdate {
    /// The target kept its index, or the ledger did not cover it.
    Unchanged,
    /// The target moved to a new index.
    Moved { from: i32, to: i32 },
    /// The target was removed; the reference now holds `-1`.
    Invalidated { from: i32 },
}

impl<T> ObjectRef<T> {
    pub const fn new(index: i32) -> Self {
        Self {
            index,
            _target: PhantomData,
        }
    }

    /// A reference pointing nowhere.
    pub const fn unassigned() -> Self {
        Self::new(UNASSIGNED)
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn is_assigned(&self) -> bool {
        self.index >= 0
    }

    /// Rewrite the stored index according to `ledger`.
    pub fn apply(&mut self, ledger: &ReindexingLedger) -> RefUpdate {
        if !self.is_assigned() {
            return RefUpdate::Unchanged;
        }
        match ledger.lookup(self.index) {
            None => RefUpdate::Unchanged,
            Some(new) if new == self.index => RefUpdate::Unchanged,
            Some(UNASSIGNED) => {
                let from = self.index;
                self.index = UNASSIGNED;
                RefUpdate::Invalidated { from }
            }
            Some(new) => {
                let from = self.index;
                self.index = new;
                RefUpdate::Moved { from, to: new }
            }
        }
    }
}

impl<T: ModelObject> ObjectRef<T> {
    /// A reference to the current slot of `object`.
    pub fn to(object: &T) -> Self {
        Self::new(object.index())
    }
}

impl<T> Clone for ObjectRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectRef<T> {}

impl<T> PartialEq for ObjectRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for ObjectRef<T> {}

impl<T> Hash for ObjectRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> Default for ObjectRef<T> {
    fn default() -> Self {
        Self::unassigned()
    }
}

impl<T> fmt::Debug for ObjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "ObjectRef<{short}>({})", self.index)
    }
}

impl<T> Serialize for ObjectRef<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.index)
    }
}

impl<'de, T> Deserialize<'de> for ObjectRef<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Particle;

    fn ledger() -> ReindexingLedger {
        [(0, 0), (1, -1), (2, 1), (3, 2)].into_iter().collect()
    }

    #[test]
    fn moved_reference() {
        let mut r = ObjectRef::<Particle>::new(3);
        assert_eq!(r.apply(&ledger()), RefUpdate::Moved { from: 3, to: 2 });
        assert_eq!(r.index(), 2);
    }

    #[test]
    fn invalidated_reference() {
        let mut r = ObjectRef::<Particle>::new(1);
        assert_eq!(r.apply(&ledger()), RefUpdate::Invalidated { from: 1 });
        assert!(!r.is_assigned());
    }

    #[test]
    fn unchanged_reference() {
        let mut r = ObjectRef::<Particle>::new(0);
        assert_eq!(r.apply(&ledger()), RefUpdate::Unchanged);
        assert_eq!(r.index(), 0);
    }

    #[test]
    fn unassigned_and_uncovered_references_are_untouched() {
        let mut r = ObjectRef::<Particle>::unassigned();
        assert_eq!(r.apply(&ledger()), RefUpdate::Unchanged);
        let mut far = ObjectRef::<Particle>::new(40);
        assert_eq!(far.apply(&ledger()), RefUpdate::Unchanged);
        assert_eq!(far.index(), 40);
    }

    #[test]
    fn serializes_as_bare_index() {
        let r = ObjectRef::<Particle>::new(7);
        assert_eq!(serde_json::to_string(&r).unwrap(), "7");
        let back: ObjectRef<Particle> = serde_json::from_str("7").unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn debug_names_target() {
        let r = ObjectRef::<Particle>::new(1);
        assert_eq!(format!("{r:?}"), "ObjectRef<Particle>(1)");
    }
}
