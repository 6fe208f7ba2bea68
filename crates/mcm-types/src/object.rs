use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize, Serializer};

/// Index value of an object that has no slot (never stored, or removed).
pub const UNASSIGNED: i32 = -1;

/// Identity bookkeeping shared by every model object.
///
/// `index` is the slot handle inside the owning store, `key` is an optional
/// stable human name that is orthogonal to the index, and `deprecated` is the
/// tombstone bit that survives until the next compaction pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub index: i32,
    pub key: Option<String>,
    pub deprecated: bool,
}

impl ObjectHeader {
    /// A fresh, unassigned header without key.
    pub fn new() -> Self {
        Self {
            index: UNASSIGNED,
            key: None,
            deprecated: false,
        }
    }

    /// A fresh, unassigned header carrying a key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new()
        }
    }

    /// Returns `true` if the header holds a store slot.
    pub fn is_assigned(&self) -> bool {
        self.index >= 0
    }
}

impl Default for ObjectHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime type tag of a model object or parameter type.
///
/// Equality and hashing use only the [`TypeId`]; the name is carried for
/// diagnostics and log output.
#[derive(Clone, Copy)]
pub struct ObjectKind {
    type_id: TypeId,
    name: &'static str,
}

impl ObjectKind {
    /// The kind of a concrete type.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The fully qualified type name.
    pub fn full_name(&self) -> &'static str {
        self.name
    }

    /// The type name without its module path.
    pub fn name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    /// Returns `true` if `value` is an instance of this kind.
    pub fn matches(&self, value: &dyn Any) -> bool {
        value.type_id() == self.type_id
    }
}

impl PartialEq for ObjectKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ObjectKind {}

impl Hash for ObjectKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKind({})", self.name())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializes as the short type name. There is no matching `Deserialize`:
/// a kind can only be obtained from a live type.
impl Serialize for ObjectKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// An indexed, soft-deletable domain entity.
///
/// Implementors only expose their [`ObjectHeader`] and the content copy used
/// by replacement; every identity operation is provided on top of that.
pub trait ModelObject: Any + Send + Sync {
    /// The identity header.
    fn header(&self) -> &ObjectHeader;

    /// Mutable access to the identity header.
    fn header_mut(&mut self) -> &mut ObjectHeader;

    /// Copy the domain content of `other` into `self`, leaving the header's
    /// index untouched.
    fn populate_from(&mut self, other: &Self)
    where
        Self: Sized;

    /// Content equality used by uniqueness validation. Defaults to "never
    /// equivalent", i.e. no duplicate detection.
    fn is_equivalent(&self, _other: &Self) -> bool
    where
        Self: Sized,
    {
        false
    }

    /// The runtime kind tag of this object type.
    fn kind() -> ObjectKind
    where
        Self: Sized,
    {
        ObjectKind::of::<Self>()
    }

    fn index(&self) -> i32 {
        self.header().index
    }

    fn set_index(&mut self, index: i32) {
        self.header_mut().index = index;
    }

    fn key(&self) -> Option<&str> {
        self.header().key.as_deref()
    }

    fn is_deprecated(&self) -> bool {
        self.header().deprecated
    }

    /// Set the tombstone bit. The index is kept until compaction.
    fn deprecate(&mut self) {
        self.header_mut().deprecated = true;
    }

    /// Clear the tombstone bit.
    fn restore(&mut self) {
        self.header_mut().deprecated = false;
    }
}

/// A value-like entity with no index and no deprecation.
///
/// Uniqueness is content equality; parameters are never reindexed.
pub trait ModelParameter: Any + Clone + PartialEq + Send + Sync {
    /// Human readable parameter name used in messages.
    fn parameter_name() -> &'static str
    where
        Self: Sized,
    {
        ObjectKind::of::<Self>().name()
    }
}
