use mcm_types::ObjectKind;

/// Errors from indexed store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The index does not address a slot of the store.
    #[error("{kind} index {index} is out of range (store holds {len} slots)")]
    IndexOutOfRange {
        kind: ObjectKind,
        index: i32,
        len: usize,
    },

    /// The index is protected and cannot be deprecated.
    #[error("{kind} index {index} is protected from deprecation")]
    ProtectedIndex { kind: ObjectKind, index: i32 },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
