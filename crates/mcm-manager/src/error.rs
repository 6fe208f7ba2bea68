use thiserror::Error;

use mcm_access::AccessError;
use mcm_events::EventError;
use mcm_pipeline::PipelineError;
use mcm_store::StoreError;
use mcm_tracker::TrackerError;
use mcm_types::ObjectKind;

use crate::data::ManagerPriority;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("event error: {0}")]
    Events(#[from] EventError),

    /// The manager was not set up to hold this object or parameter type.
    #[error("manager '{manager}' does not support {kind}")]
    UnsupportedType { manager: String, kind: ObjectKind },

    /// The tracker resolved the object to a store owned by another manager.
    #[error("{kind} {index} is not held by manager '{manager}'")]
    NotOwned {
        manager: String,
        kind: ObjectKind,
        index: i32,
    },

    /// A dependency would let a cascade flow against the global lock order.
    #[error(
        "'{downstream}' ({downstream_priority}) cannot depend on '{upstream}' ({upstream_priority})"
    )]
    LockOrderViolation {
        upstream: String,
        upstream_priority: ManagerPriority,
        downstream: String,
        downstream_priority: ManagerPriority,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("project connection table is poisoned")]
    Poisoned,

    #[error("cache '{cache}' is poisoned (entry '{entry}')")]
    CachePoisoned { cache: String, entry: String },
}

impl ManagerError {
    /// Returns `true` if the operation failed because data was locked by
    /// someone else and may succeed when retried.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Access(e) | Self::Tracker(TrackerError::Access(e)) => e.is_busy(),
            _ => false,
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
