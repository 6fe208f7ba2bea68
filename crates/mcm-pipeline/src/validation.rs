//! Validation pipelines and the shared validation rules.

use std::any::Any;
use std::fmt;

use anyhow::anyhow;
use tracing::debug;

use mcm_types::{ModelObject, ModelParameter, ObjectKind};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::BreakPipeline;
use crate::report::{ValidationReport, Warning};

/// Erased validation handler over data `D`.
pub type ValidationFn<D> =
    dyn Fn(&dyn Any, &D) -> anyhow::Result<ValidationReport> + Send + Sync;

/// Break pipeline deciding whether a candidate may enter data `D`.
///
/// Candidates without a handler get a neutral, good report unless a
/// different fallback was installed.
pub struct ValidationPipeline<D> {
    table: BreakPipeline<ValidationFn<D>>,
}

impl<D: 'static> ValidationPipeline<D> {
    pub fn new() -> Self {
        Self {
            table: BreakPipeline::new(Box::new(neutral::<D>)),
        }
    }

    /// A pipeline whose fallback fails: candidates without a handler are a
    /// fault, not a rejection.
    pub fn strict() -> Self {
        Self::new()
            .with_fallback(|_, _| Err(anyhow!("invalid object passed to validation pipeline")))
    }

    /// Replace the fallback handler.
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&dyn Any, &D) -> anyhow::Result<ValidationReport> + Send + Sync + 'static,
    {
        self.table.set_fallback(Box::new(fallback));
        self
    }

    /// Append a handler for candidates of type `T`.
    pub fn register<T, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        T: Any,
        F: Fn(&T, &D) -> anyhow::Result<ValidationReport> + Send + Sync + 'static,
    {
        let kind = ObjectKind::of::<T>();
        self.table.push(
            kind,
            name,
            Box::new(move |candidate: &dyn Any, data: &D| {
                let object = candidate
                    .downcast_ref::<T>()
                    .ok_or_else(|| anyhow!("candidate is not a {kind}"))?;
                handler(object, data)
            }),
        );
        self
    }

    /// Run the first handler matching the runtime type of `candidate`.
    pub fn validate(&self, candidate: &dyn Any, data: &D) -> PipelineResult<ValidationReport> {
        let selected = self.table.select(candidate);
        let report = (selected.function)(candidate, data).map_err(|e| {
            PipelineError::fault(selected.name, selected.candidate_label(), e)
        })?;
        debug!(
            handler = selected.name,
            good = report.is_good(),
            warnings = report.warnings().len(),
            "candidate validated"
        );
        Ok(report)
    }

    /// Returns `true` if a handler other than the fallback accepts `T`.
    pub fn handles<T: Any>(&self) -> bool {
        self.table.handles(ObjectKind::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn neutral<D>(_candidate: &dyn Any, _data: &D) -> anyhow::Result<ValidationReport> {
    Ok(ValidationReport::new())
}

impl<D: 'static> Default for ValidationPipeline<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for ValidationPipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidationPipeline").field(&self.table).finish()
    }
}

/// Add a critical duplicate warning for every live object in `existing`
/// that is equivalent to `candidate`.
pub fn validate_uniqueness<'a, T>(
    candidate: &T,
    existing: impl IntoIterator<Item = &'a T>,
    report: &mut ValidationReport,
) where
    T: ModelObject + 'a,
{
    for item in existing {
        if !item.is_deprecated() && item.is_equivalent(candidate) {
            report.add_warning(Warning::duplicate(format!(
                "the provided {} duplicates the existing object with index ({})",
                T::kind(),
                item.index()
            )));
        }
    }
}

/// Add a notice when `replacement` has the same content as `original`.
pub fn validate_parameter_change<P: ModelParameter>(
    original: &P,
    replacement: &P,
    report: &mut ValidationReport,
) {
    if original == replacement {
        report.add_warning(Warning::parameter_identical(format!(
            "the current {} equals the provided replacement",
            P::parameter_name()
        )));
    }
}
