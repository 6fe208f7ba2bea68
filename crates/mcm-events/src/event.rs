use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mcm_types::{ModelObject, ModelParameter, ObjectKind, ReindexingLedger};

/// Type-erased, shared snapshot of an object or parameter.
pub type Snapshot = Arc<dyn Any + Send + Sync>;

/// What happened to the subject of a [`ModelEvent`].
#[derive(Clone, Debug)]
pub enum ChangeKind {
    /// An object was stored at `index`.
    ObjectAdded { index: i32, object: Snapshot },
    /// The object at `index` was replaced; `object` is the new content.
    ObjectChanged { index: i32, object: Snapshot },
    /// The object at `index` was deprecated.
    ObjectRemoved { index: i32, object: Snapshot },
    /// The store was compacted.
    Reindexed { ledger: Arc<ReindexingLedger> },
    /// A parameter was replaced; `parameter` is the new value.
    ParameterChanged { parameter: Snapshot },
    /// The manager's data went back to its defaults.
    ManagerReset,
}

/// Payload-free discriminant of a [`ChangeKind`], used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeTag {
    ObjectAdded,
    ObjectChanged,
    ObjectRemoved,
    Reindexed,
    ParameterChanged,
    ManagerReset,
}

impl ChangeKind {
    pub fn tag(&self) -> ChangeTag {
        match self {
            Self::ObjectAdded { .. } => ChangeTag::ObjectAdded,
            Self::ObjectChanged { .. } => ChangeTag::ObjectChanged,
            Self::ObjectRemoved { .. } => ChangeTag::ObjectRemoved,
            Self::Reindexed { .. } => ChangeTag::Reindexed,
            Self::ParameterChanged { .. } => ChangeTag::ParameterChanged,
            Self::ManagerReset => ChangeTag::ManagerReset,
        }
    }
}

impl fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectAdded => f.write_str("object added"),
            Self::ObjectChanged => f.write_str("object changed"),
            Self::ObjectRemoved => f.write_str("object removed"),
            Self::Reindexed => f.write_str("reindexed"),
            Self::ParameterChanged => f.write_str("parameter changed"),
            Self::ManagerReset => f.write_str("manager reset"),
        }
    }
}

/// A change notification published by one manager.
#[derive(Clone, Debug)]
pub struct ModelEvent {
    /// Name of the publishing channel.
    pub source: String,
    /// Position in the publishing channel's sequence, starting at 1.
    pub sequence: u64,
    /// Type of the object or parameter the change is about. `ManagerReset`
    /// carries the kind of the manager's data.
    pub kind: ObjectKind,
    pub change: ChangeKind,
}

impl ModelEvent {
    pub fn tag(&self) -> ChangeTag {
        self.change.tag()
    }

    /// The object or parameter snapshot, if the change carries one.
    pub fn snapshot(&self) -> Option<&(dyn Any + Send + Sync)> {
        match &self.change {
            ChangeKind::ObjectAdded { object, .. }
            | ChangeKind::ObjectChanged { object, .. }
            | ChangeKind::ObjectRemoved { object, .. } => Some(object.as_ref()),
            ChangeKind::ParameterChanged { parameter } => Some(parameter.as_ref()),
            ChangeKind::Reindexed { .. } | ChangeKind::ManagerReset => None,
        }
    }

    /// The snapshot downcast to `T`.
    pub fn object<T: Any>(&self) -> Option<&T> {
        self.snapshot()?.downcast_ref::<T>()
    }

    /// The index the change is about, for object changes.
    pub fn index(&self) -> Option<i32> {
        match &self.change {
            ChangeKind::ObjectAdded { index, .. }
            | ChangeKind::ObjectChanged { index, .. }
            | ChangeKind::ObjectRemoved { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn ledger(&self) -> Option<&ReindexingLedger> {
        match &self.change {
            ChangeKind::Reindexed { ledger } => Some(ledger),
            _ => None,
        }
    }
}

impl ChangeKind {
    pub fn added<T: ModelObject + Clone>(object: &T) -> Self {
        Self::ObjectAdded {
            index: object.index(),
            object: Arc::new(object.clone()),
        }
    }

    pub fn changed<T: ModelObject + Clone>(object: &T) -> Self {
        Self::ObjectChanged {
            index: object.index(),
            object: Arc::new(object.clone()),
        }
    }

    pub fn removed<T: ModelObject + Clone>(object: &T) -> Self {
        Self::ObjectRemoved {
            index: object.index(),
            object: Arc::new(object.clone()),
        }
    }

    pub fn parameter<P: ModelParameter>(parameter: &P) -> Self {
        Self::ParameterChanged {
            parameter: Arc::new(parameter.clone()),
        }
    }

    pub fn reindexed(ledger: ReindexingLedger) -> Self {
        Self::Reindexed {
            ledger: Arc::new(ledger),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcm_types::ObjectHeader;

    #[derive(Clone, Debug, PartialEq)]
    struct Cation {
        header: ObjectHeader,
        charge: i8,
    }

    impl ModelObject for Cation {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut ObjectHeader {
            &mut self.header
        }

        fn populate_from(&mut self, other: &Self) {
            self.charge = other.charge;
        }
    }

    fn event(change: ChangeKind) -> ModelEvent {
        ModelEvent {
            source: "particles".into(),
            sequence: 1,
            kind: Cation::kind(),
            change,
        }
    }

    #[test]
    fn object_snapshot_downcasts() {
        let mut cation = Cation {
            header: ObjectHeader::new(),
            charge: 2,
        };
        cation.set_index(3);

        let event = event(ChangeKind::removed(&cation));
        assert_eq!(event.tag(), ChangeTag::ObjectRemoved);
        assert_eq!(event.index(), Some(3));
        assert_eq!(event.object::<Cation>(), Some(&cation));
        assert!(event.object::<String>().is_none());
        assert!(event.ledger().is_none());
    }

    #[test]
    fn reindex_event_carries_ledger() {
        let ledger: ReindexingLedger = [(0, -1), (1, 0)].into_iter().collect();
        let event = event(ChangeKind::reindexed(ledger));
        assert_eq!(event.tag(), ChangeTag::Reindexed);
        assert_eq!(event.ledger().unwrap().lookup(1), Some(0));
        assert!(event.snapshot().is_none());
        assert!(event.index().is_none());
    }

    #[test]
    fn tag_display() {
        assert_eq!(ChangeTag::ParameterChanged.to_string(), "parameter changed");
        assert_eq!(ChangeKind::ManagerReset.tag(), ChangeTag::ManagerReset);
    }
}
