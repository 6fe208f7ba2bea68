//! Indexed object store for the lattice modeler.
//!
//! An [`IndexedStore`] is an arena of model objects of one concrete type.
//! The object's index is its slot handle, the deprecation flag is a
//! tombstone, and compaction is the arena's explicit garbage-collection pass.
//!
//! # Design Rules
//!
//! 1. Among non-deprecated objects, indices are unique; after compaction they
//!    form the contiguous range `[0, N)`.
//! 2. Deprecated objects keep their last index until compaction runs.
//! 3. Compaction always returns a [`ReindexingLedger`](mcm_types::ReindexingLedger)
//!    covering every pre-compaction slot, even when nothing moved.
//! 4. The store is never shared directly: it lives inside a lock-guarded data
//!    object, so `&mut` access implies an exclusive lock.

pub mod error;
pub mod store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use store::{DeprecateWhere, IndexedStore};
pub use traits::HasStore;
