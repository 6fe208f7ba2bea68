//! Declarative, type-dispatched pipelines.
//!
//! A [`BreakPipeline`] is an ordered table of handlers keyed by the runtime
//! type of the candidate. Processing picks the first handler whose type
//! matches and stops there; a candidate no handler accepts goes to the
//! fallback. Handler tables are built explicitly when a manager is
//! constructed, never discovered at runtime.
//!
//! Two specializations carry the model's input rules:
//!
//! - [`ValidationPipeline`] — decides whether a new object or parameter may
//!   enter the data, producing a [`ValidationReport`]
//! - [`ConflictPipeline`] — repairs existing data after a change, producing
//!   a [`ConflictReport`]; a [`ConflictResolver`] holds one per
//!   [`DataOperation`]
//!
//! Rejections are reports with `is_good() == false`. Only a handler that
//! itself fails turns into a [`PipelineError::HandlerFault`].

pub mod conflict;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod validation;

pub use conflict::{ConflictFn, ConflictPipeline, ConflictResolver, DataOperation};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{BreakPipeline, Selected};
pub use report::{ConflictReport, DeprecatedObject, ValidationReport, Warning};
pub use validation::{validate_parameter_change, validate_uniqueness, ValidationFn, ValidationPipeline};
