//! A project: the managers of one model and the dependencies between them.

use std::sync::{Arc, RwLock};

use anyhow::bail;
use serde::Serialize;
use tracing::info;

use mcm_events::SubscriptionId;

use crate::data::{ManagerPriority, ModelData};
use crate::error::{ManagerError, ManagerResult};
use crate::manager::{ManagerBuilder, ModelManager};
use crate::services::ProjectServices;
use crate::settings::ProjectSettings;

/// A dependency of one manager on another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub upstream: String,
    pub upstream_priority: ManagerPriority,
    pub downstream: String,
    pub downstream_priority: ManagerPriority,
    #[serde(skip)]
    pub subscription: SubscriptionId,
}

/// Owns the shared services and wires managers together.
///
/// Managers only ever depend on managers of strictly lower priority. The
/// upstream manager publishes after releasing its data lock, and the
/// downstream manager repairs its data under its own lock, so a cascade
/// holds at most one data lock at a time and always moves towards higher
/// priorities.
#[derive(Debug)]
pub struct ModelProject {
    services: Arc<ProjectServices>,
    connections: RwLock<Vec<Connection>>,
}

impl ModelProject {
    pub fn new(settings: ProjectSettings) -> ManagerResult<Self> {
        Ok(Self {
            services: ProjectServices::new(settings)?,
            connections: RwLock::new(Vec::new()),
        })
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    /// Start a manager on this project's services.
    pub fn manager<D: ModelData>(
        &self,
        name: impl Into<String>,
        priority: ManagerPriority,
        data: D,
    ) -> ManagerBuilder<D> {
        ModelManager::builder(name, priority, data, &self.services)
    }

    /// Make `downstream` repair its data whenever `upstream` publishes a
    /// change.
    ///
    /// The subscription holds the downstream manager weakly. A downstream
    /// report that is not good is handed back to the upstream operation as
    /// a dependency failure.
    pub fn connect<U, W>(
        &self,
        upstream: &Arc<ModelManager<U>>,
        downstream: &Arc<ModelManager<W>>,
    ) -> ManagerResult<Connection>
    where
        U: ModelData,
        W: ModelData,
    {
        if downstream.priority() <= upstream.priority() {
            return Err(ManagerError::LockOrderViolation {
                upstream: upstream.name().to_owned(),
                upstream_priority: upstream.priority(),
                downstream: downstream.name().to_owned(),
                downstream_priority: downstream.priority(),
            });
        }

        let weak = Arc::downgrade(downstream);
        let subscription = upstream
            .events()
            .subscribe(downstream.name(), move |event| {
                let Some(manager) = weak.upgrade() else {
                    return Ok(());
                };
                let report = manager.handle_dependency_event(event)?;
                if !report.is_good() {
                    bail!("{report}");
                }
                Ok(())
            })?;

        let connection = Connection {
            upstream: upstream.name().to_owned(),
            upstream_priority: upstream.priority(),
            downstream: downstream.name().to_owned(),
            downstream_priority: downstream.priority(),
            subscription,
        };
        self.connections
            .write()
            .map_err(|_| ManagerError::Poisoned)?
            .push(connection.clone());
        info!(
            upstream = %connection.upstream,
            downstream = %connection.downstream,
            "managers connected"
        );
        Ok(connection)
    }

    pub fn connections(&self) -> ManagerResult<Vec<Connection>> {
        Ok(self
            .connections
            .read()
            .map_err(|_| ManagerError::Poisoned)?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use mcm_events::{ChangeTag, EventFilter};
    use mcm_pipeline::{ConflictPipeline, ConflictReport, ConflictResolver, DataOperation, Warning};
    use mcm_types::ModelObject;

    fn project() -> ModelProject {
        ModelProject::new(ProjectSettings::fast()).unwrap()
    }

    #[test]
    fn removal_cascades_to_connected_manager() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());
        project.connect(&particles, &pairs).unwrap();

        for symbol in ["A", "B", "C"] {
            particles.input_object(Particle::new(symbol, 1)).unwrap();
        }
        for (first, second) in [(1, 3), (2, 3), (1, 2)] {
            pairs
                .input_object(PairInteraction::new(first, second))
                .unwrap();
        }
        let mut removals = pairs
            .subscribe_stream(EventFilter {
                changes: Some(vec![ChangeTag::ObjectRemoved]),
                ..EventFilter::default()
            })
            .unwrap();

        let report = particles.remove_object::<Particle>(2).unwrap();
        assert!(report.is_good(), "{report}");
        assert!(report.dependency_failures().is_empty());

        let deprecated = pairs
            .query(|data| {
                data.pairs
                    .iter()
                    .filter(|p| p.is_deprecated())
                    .map(|p| p.index())
                    .collect::<Vec<_>>()
            })
            .unwrap();
        assert_eq!(deprecated, vec![1, 2]);

        let announced: Vec<Option<i32>> = (0..2)
            .map(|_| removals.try_recv().unwrap().index())
            .collect();
        assert_eq!(announced, vec![Some(1), Some(2)]);
        assert!(removals.try_recv().is_err());
    }

    #[test]
    fn cascade_deprecation_reaches_managers_of_the_holder() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());
        let couplings = coupling_manager(project.services());
        project.connect(&pairs, &couplings).unwrap();

        for symbol in ["A", "B", "C"] {
            particles.input_object(Particle::new(symbol, 1)).unwrap();
        }
        for (first, second) in [(1, 2), (1, 3)] {
            pairs
                .input_object(PairInteraction::new(first, second))
                .unwrap();
        }
        for pair in [0, 1] {
            couplings.input_object(Coupling::new(pair)).unwrap();
        }
        let mut coupling_removals = couplings
            .subscribe_stream(EventFilter {
                changes: Some(vec![ChangeTag::ObjectRemoved]),
                ..EventFilter::default()
            })
            .unwrap();

        // Pairs only learn about the removal when the particles are compacted.
        particles.remove_object::<Particle>(2).unwrap();
        let report = particles.clean_deprecated::<Particle>().unwrap();
        assert!(report.is_good(), "{report}");
        assert!(report.dependency_failures().is_empty());
        assert_eq!(report.propagation()[0].deprecated, vec![0]);

        let deprecated = couplings
            .query(|data| {
                data.couplings
                    .iter()
                    .filter(|c| c.is_deprecated())
                    .map(|c| c.index())
                    .collect::<Vec<_>>()
            })
            .unwrap();
        assert_eq!(deprecated, vec![0]);
        assert_eq!(coupling_removals.try_recv().unwrap().index(), Some(0));
    }

    #[test]
    fn cascade_listener_failure_is_reported() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());
        let stubborn = project
            .manager("stubborn couplings", ManagerPriority::Simulations, CouplingData::default())
            .with_kind::<Coupling>()
            .with_dependency_handlers(ConflictResolver::new().on(
                DataOperation::ObjectRemoval,
                ConflictPipeline::<CouplingData>::new().register::<PairInteraction, _>(
                    "veto",
                    |_, _| {
                        let mut report = ConflictReport::new();
                        report.add_warning(Warning::critical("pairs are load bearing"));
                        Ok(report)
                    },
                ),
            ))
            .build()
            .unwrap();
        project.connect(&pairs, &stubborn).unwrap();

        particles.input_object(Particle::new("A", 1)).unwrap();
        pairs.input_object(PairInteraction::new(1, 1)).unwrap();
        particles.remove_object::<Particle>(1).unwrap();

        let report = particles.clean_deprecated::<Particle>().unwrap();
        assert!(report.is_good());
        assert_eq!(report.dependency_failures().len(), 1);
        assert!(report.dependency_failures()[0].starts_with("stubborn couplings:"));
    }

    #[test]
    fn downstream_rejection_is_reported_upstream() {
        let project = project();
        let particles = particle_manager(project.services());
        let guarded = project
            .manager("guarded pairs", ManagerPriority::Energies, PairData::default())
            .with_kind::<PairInteraction>()
            .with_dependency_handlers(ConflictResolver::new().on(
                DataOperation::NewObject,
                ConflictPipeline::<PairData>::new().register::<Particle, _>("veto", |_, _| {
                    let mut report = ConflictReport::new();
                    report.add_warning(Warning::critical("no new particles"));
                    Ok(report)
                }),
            ))
            .build()
            .unwrap();
        project.connect(&particles, &guarded).unwrap();

        let report = particles.input_object(Particle::new("A", 1)).unwrap();
        assert!(report.is_good());
        assert_eq!(report.dependency_failures().len(), 1);
        assert!(report.dependency_failures()[0].starts_with("guarded pairs:"));
        assert!(particles.find_by_key::<Particle>("A").unwrap().is_some());
    }

    #[test]
    fn dependency_against_lock_order_is_refused() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());

        let err = project.connect(&pairs, &particles).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::LockOrderViolation {
                upstream_priority: ManagerPriority::Energies,
                downstream_priority: ManagerPriority::Particles,
                ..
            }
        ));

        let err = project.connect(&particles, &particles).unwrap_err();
        assert!(matches!(err, ManagerError::LockOrderViolation { .. }));
        assert!(project.connections().unwrap().is_empty());
    }

    #[test]
    fn connections_are_listed() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());

        let connection = project.connect(&particles, &pairs).unwrap();
        assert_eq!(connection.upstream, "particles");
        assert_eq!(connection.downstream, "pairs");
        assert_eq!(project.connections().unwrap(), vec![connection]);
        assert_eq!(
            particles.events().subscriber_names().unwrap(),
            vec!["pairs".to_string()]
        );
    }

    #[test]
    fn dropped_downstream_is_skipped() {
        let project = project();
        let particles = particle_manager(project.services());
        let pairs = pair_manager(project.services());
        project.connect(&particles, &pairs).unwrap();
        drop(pairs);

        let report = particles.input_object(Particle::new("A", 1)).unwrap();
        assert!(report.is_good());
        assert!(report.dependency_failures().is_empty());
    }
}
