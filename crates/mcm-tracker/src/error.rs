use mcm_access::AccessError;
use mcm_types::ObjectKind;

use crate::tracker::StoreId;

/// Errors from tracker lookups and reference propagation.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No live entry for the requested index or key.
    #[error("{kind} reference not found: {reference}")]
    ReferenceNotFound { kind: ObjectKind, reference: String },

    /// The store id was never handed out by this tracker.
    #[error("unknown store {0}")]
    UnknownStore(StoreId),

    /// A holder store could not be locked during propagation.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// A thread panicked while holding one of the tracker maps.
    #[error("tracker state is poisoned")]
    Poisoned,
}

impl TrackerError {
    pub(crate) fn missing_index(kind: ObjectKind, index: i32) -> Self {
        Self::ReferenceNotFound {
            kind,
            reference: format!("index {index}"),
        }
    }

    pub(crate) fn missing_key(kind: ObjectKind, key: &str) -> Self {
        Self::ReferenceNotFound {
            kind,
            reference: format!("key '{key}'"),
        }
    }
}

/// Result alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
