//! Object tracker and reference resolver.
//!
//! The [`ObjectTracker`] is the project-wide index of model objects: it maps
//! `(kind, index)` and `(kind, key)` to the store that owns the object, and
//! it knows every place where other objects hold an
//! [`ObjectRef`](mcm_types::ObjectRef) into a given kind.
//!
//! When a store is compacted, the resulting
//! [`ReindexingLedger`](mcm_types::ReindexingLedger) is handed to the
//! tracker, which remaps its own entries and then walks every registered
//! [`ReferenceSite`] for that kind. Holders whose reference was invalidated
//! are deprecated in turn.
//!
//! # Design Rules
//!
//! 1. Entries of a kind are remapped only through a ledger produced by the
//!    store that owns them.
//! 2. Propagation never holds the tracker's own maps locked while it locks a
//!    holder store.
//! 3. Reference sites are locked one at a time, never nested.

pub mod error;
pub mod site;
pub mod tracker;

pub use error::{TrackerError, TrackerResult};
pub use site::{PropagationReport, ReferenceSite, References, StoreReferenceSite};
pub use tracker::{ObjectTracker, ReindexSummary, Resolved, StoreId, TrackerEntry};
