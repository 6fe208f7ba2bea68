//! Foundation types for the lattice model store.
//!
//! Every domain manager of the modeler (particles, structures, transitions,
//! energies, simulations) keeps its entities in indexed stores. This crate
//! defines the vocabulary those stores share.
//!
//! # Key Types
//!
//! - [`ModelObject`] — An indexed, soft-deletable domain entity
//! - [`ObjectHeader`] — Index, optional key, and deprecation flag of a model object
//! - [`ModelParameter`] — A value-like, unindexed entity compared by content
//! - [`ObjectKind`] — Runtime type tag used by trackers and pipelines
//! - [`ObjectRef`] — Typed index reference embedded in other model objects
//! - [`ReindexingLedger`] — Old-to-new index mapping produced by a compaction pass

pub mod error;
pub mod ledger;
pub mod object;
pub mod reference;

pub use error::TypeError;
pub use ledger::{ReindexEntry, ReindexingLedger};
pub use object::{ModelObject, ModelParameter, ObjectHeader, ObjectKind, UNASSIGNED};
pub use reference::{ObjectRef, RefUpdate};
