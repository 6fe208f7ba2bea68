//! Concurrency-safe access to model data.
//!
//! Each domain manager owns one data object guarded by one
//! [`AccessLockSource`]: a reader/writer lock whose acquisition retries a
//! bounded number of times before failing with
//! [`AccessError::LockTimeout`]. Managers never touch the lock directly;
//! they go through a [`DataAccessorSource`] that hands out scoped
//! [`DataAccessor`] (exclusive) and [`DataReader`] (shared) values.
//!
//! # Design Rules
//!
//! 1. Writes exclude reads and writes; any number of reads may overlap.
//! 2. The only suspension point is lock acquisition.
//! 3. A lock is released exactly once, when its guard drops.
//! 4. The guarded data is never reachable outside an accessor scope.
//! 5. Locks on two different sources are independent. Callers that need
//!    more than one must acquire them in a fixed global order.

pub mod accessor;
pub mod config;
pub mod error;
pub mod lock;

pub use accessor::{DataAccessor, DataAccessorSource, DataReader};
pub use config::LockConfig;
pub use error::{AccessError, AccessMode, AccessResult};
pub use lock::{AccessLockSource, ReadLock, WriteLock};
