use std::fmt;
use std::time::Duration;

/// The kind of access a lock grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors from lock acquisition and accessor creation.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The lock could not be acquired within the configured attempt budget.
    #[error("{mode} lock on '{source_name}' timed out after {retries} retries ({waited:?})")]
    LockTimeout {
        source_name: String,
        mode: AccessMode,
        retries: u32,
        waited: Duration,
    },

    /// A single-attempt acquisition found the lock held.
    #[error("{mode} lock on '{source_name}' is busy")]
    Busy {
        source_name: String,
        mode: AccessMode,
    },

    /// A writer panicked while holding the lock; the data may be inconsistent.
    #[error("lock on '{source_name}' is poisoned")]
    Poisoned { source_name: String },

    /// The lock configuration is invalid.
    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),

    /// A blocking query task failed to complete.
    #[error("blocking query task failed: {0}")]
    TaskFailed(String),
}

impl AccessError {
    /// Returns `true` for the "data is busy, try again" family of errors.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Busy { .. })
    }
}

/// Result alias for access operations.
pub type AccessResult<T> = Result<T, AccessError>;
