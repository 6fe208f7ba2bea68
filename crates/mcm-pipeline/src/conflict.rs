//! Conflict resolution pipelines, one per kind of data operation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mcm_types::ObjectKind;

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::BreakPipeline;
use crate::report::ConflictReport;

/// The change that triggered conflict resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataOperation {
    NewObject,
    ObjectChange,
    ObjectRemoval,
    ParameterChange,
}

impl fmt::Display for DataOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewObject => f.write_str("new object"),
            Self::ObjectChange => f.write_str("object change"),
            Self::ObjectRemoval => f.write_str("object removal"),
            Self::ParameterChange => f.write_str("parameter change"),
        }
    }
}

/// Erased conflict handler over data `D`.
pub type ConflictFn<D> = dyn Fn(&dyn Any, &mut D) -> anyhow::Result<ConflictReport> + Send + Sync;

/// Break pipeline that repairs data `D` after a change to a candidate.
///
/// Candidates without a handler cause no conflicts.
pub struct ConflictPipeline<D> {
    table: BreakPipeline<ConflictFn<D>>,
}

impl<D: 'static> ConflictPipeline<D> {
    pub fn new() -> Self {
        Self {
            table: BreakPipeline::new(Box::new(no_conflicts::<D>)),
        }
    }

    /// Append a handler for candidates of type `T`.
    pub fn register<T, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        T: Any,
        F: Fn(&T, &mut D) -> anyhow::Result<ConflictReport> + Send + Sync + 'static,
    {
        let kind = ObjectKind::of::<T>();
        self.table.push(
            kind,
            name,
            Box::new(move |candidate: &dyn Any, data: &mut D| {
                let object = candidate
                    .downcast_ref::<T>()
                    .ok_or_else(|| anyhow!("candidate is not a {kind}"))?;
                handler(object, data)
            }),
        );
        self
    }

    /// Run the first handler matching the runtime type of `candidate`.
    pub fn resolve(&self, candidate: &dyn Any, data: &mut D) -> PipelineResult<ConflictReport> {
        let selected = self.table.select(candidate);
        let report = (selected.function)(candidate, data).map_err(|e| {
            PipelineError::fault(selected.name, selected.candidate_label(), e)
        })?;
        if !selected.is_fallback() {
            debug!(
                handler = selected.name,
                good = report.is_good(),
                deprecated = report.deprecated().len(),
                "conflicts resolved"
            );
        }
        Ok(report)
    }

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

fn no_conflicts<D>(_candidate: &dyn Any, _data: &mut D) -> anyhow::Result<ConflictReport> {
    Ok(ConflictReport::new())
}

impl<D: 'static> Default for ConflictPipeline<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for ConflictPipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConflictPipeline").field(&self.table).finish()
    }
}

/// One [`ConflictPipeline`] per [`DataOperation`].
///
/// Operations without a pipeline resolve to an empty, good report.
pub struct ConflictResolver<D> {
    pipelines: HashMap<DataOperation, ConflictPipeline<D>>,
}

impl<D: 'static> ConflictResolver<D> {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// Install the pipeline for `operation`, replacing any previous one.
    pub fn on(mut self, operation: DataOperation, pipeline: ConflictPipeline<D>) -> Self {
        self.pipelines.insert(operation, pipeline);
        self
    }

    pub fn pipeline(&self, operation: DataOperation) -> Option<&ConflictPipeline<D>> {
        self.pipelines.get(&operation)
    }

    pub fn resolve(
        &self,
        operation: DataOperation,
        candidate: &dyn Any,
        data: &mut D,
    ) -> PipelineResult<ConflictReport> {
        match self.pipelines.get(&operation) {
            Some(pipeline) => pipeline.resolve(candidate, data),
            None => Ok(ConflictReport::new()),
        }
    }
}

impl<D: 'static> Default for ConflictResolver<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for ConflictResolver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.pipelines.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Warning;
    use mcm_types::{ModelObject, ObjectHeader, ObjectRef};

    #[derive(Clone)]
    struct Species {
        header: ObjectHeader,
    }

    impl ModelObject for Species {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut ObjectHeader {
            &mut self.header
        }

        fn populate_from(&mut self, _other: &Self) {}
    }

    #[derive(Clone)]
    struct Occupation {
        header: ObjectHeader,
        species: ObjectRef<Species>,
    }

    impl ModelObject for Occupation {
        fn header(&self) -> &ObjectHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut ObjectHeader {
            &mut self.header
        }

        fn populate_from(&mut self, other: &Self) {
            self.species = other.species;
        }
    }

    #[derive(Default)]
    struct Data {
        occupations: Vec<Occupation>,
    }

    fn data() -> Data {
        let occupations = [0, 1, 0]
            .into_iter()
            .enumerate()
            .map(|(index, species)| {
                let mut occupation = Occupation {
                    header: ObjectHeader::new(),
                    species: ObjectRef::new(species),
                };
                occupation.set_index(index as i32);
                occupation
            })
            .collect();
        Data { occupations }
    }

    fn removed_species(index: i32) -> Species {
        let mut species = Species {
            header: ObjectHeader::new(),
        };
        species.set_index(index);
        species.deprecate();
        species
    }

    fn removal_pipeline() -> ConflictPipeline<Data> {
        ConflictPipeline::new().register::<Species, _>("occupations", |species, data: &mut Data| {
            let mut report = ConflictReport::new();
            for occupation in &mut data.occupations {
                if occupation.species.index() == species.index() && !occupation.is_deprecated() {
                    occupation.deprecate();
                    report.record_deprecation(&*occupation);
                }
            }
            Ok(report)
        })
    }

    #[test]
    fn removal_handler_deprecates_dependents() {
        let resolver = ConflictResolver::new().on(DataOperation::ObjectRemoval, removal_pipeline());
        let mut data = data();

        let report = resolver
            .resolve(DataOperation::ObjectRemoval, &removed_species(0), &mut data)
            .unwrap();

        assert!(report.is_good());
        let indices: Vec<i32> = report.deprecated().iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(!data.occupations[1].is_deprecated());
    }

    #[test]
    fn missing_operation_is_conflict_free() {
        let resolver = ConflictResolver::new().on(DataOperation::ObjectRemoval, removal_pipeline());
        let mut data = data();

        let report = resolver
            .resolve(DataOperation::NewObject, &removed_species(0), &mut data)
            .unwrap();

        assert!(report.is_good());
        assert!(report.deprecated().is_empty());
        assert!(data.occupations.iter().all(|o| !o.is_deprecated()));
        assert!(resolver.pipeline(DataOperation::NewObject).is_none());
    }

    #[test]
    fn unhandled_candidate_is_conflict_free() {
        let pipeline = removal_pipeline();
        let mut data = data();
        let report = pipeline.resolve(&42_u32, &mut data).unwrap();
        assert!(report.is_good());
        assert!(pipeline.handles::<Species>());
        assert!(!pipeline.handles::<u32>());
    }

    #[test]
    fn unresolvable_conflict_is_a_bad_report_not_an_error() {
        let pipeline = ConflictPipeline::<Data>::new().register::<Species, _>("strict", |_, _| {
            let mut report = ConflictReport::new();
            report.add_warning(Warning::critical("species still in use"));
            Ok(report)
        });
        let report = pipeline.resolve(&removed_species(1), &mut data()).unwrap();
        assert!(!report.is_good());
    }

    #[test]
    fn handler_error_is_a_fault() {
        let pipeline = ConflictPipeline::<Data>::new()
            .register::<Species, _>("broken", |_, _| Err(anyhow!("index table corrupt")));
        let err = pipeline.resolve(&removed_species(1), &mut data()).unwrap_err();
        assert_eq!(err.handler(), "broken");
        assert!(err.to_string().contains("index table corrupt"));
    }

    #[test]
    fn operation_display() {
        assert_eq!(DataOperation::ObjectRemoval.to_string(), "object removal");
        assert_eq!(
            serde_json::to_string(&DataOperation::ParameterChange).unwrap(),
            "\"ParameterChange\""
        );
    }
}
