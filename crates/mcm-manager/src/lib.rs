//! Model managers for the lattice modeler.
//!
//! A [`ModelManager`] owns one domain's data (particles, structures,
//! transitions, energies, simulations) behind a timed reader/writer lock and
//! is the only way to change it. Every input operation follows the same
//! path:
//!
//! 1. take the project-wide input lock
//! 2. take the manager's data write lock
//! 3. validate the candidate, store it, resolve the conflicts it causes
//! 4. release the data lock
//! 5. update the object tracker and propagate reindexing to reference sites
//! 6. publish the change to dependent managers
//!
//! Dependent managers are wired together by a [`ModelProject`], which only
//! lets a manager listen to managers of strictly lower [`ManagerPriority`].
//! Together with step 4 this keeps every cascade flowing one way and never
//! holds two data locks at once.

pub mod cache;
mod cascade;
pub mod data;
pub mod error;
pub mod manager;
pub mod project;
pub mod report;
pub mod services;
pub mod settings;

#[cfg(test)]
mod fixtures;

pub use cache::{CachedValue, ModelCache};
pub use data::{HasParameter, InsertMode, ManagerPriority, ModelData};
pub use error::{ManagerError, ManagerResult};
pub use manager::{ManagerBuilder, ModelManager};
pub use project::{Connection, ModelProject};
pub use report::OperationReport;
pub use services::ProjectServices;
pub use settings::ProjectSettings;

// Re-export the building blocks managers are assembled from
pub use mcm_access::{AccessError, LockConfig};
pub use mcm_events::{ChangeKind, ChangeTag, EventFilter, EventStream, ModelEvent};
pub use mcm_pipeline::{
    ConflictPipeline, ConflictReport, ConflictResolver, DataOperation, ValidationPipeline,
    ValidationReport, Warning,
};
pub use mcm_store::{HasStore, IndexedStore};
pub use mcm_tracker::{ObjectTracker, PropagationReport, References};
pub use mcm_types::{ModelObject, ModelParameter, ObjectHeader, ObjectKind, ObjectRef};
