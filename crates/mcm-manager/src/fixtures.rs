//! Particle and pair-interaction data shared by the manager tests.

use std::sync::Arc;

use mcm_pipeline::{
    validate_uniqueness, ConflictPipeline, ConflictReport, ConflictResolver, DataOperation,
    ValidationPipeline, ValidationReport,
};
use mcm_store::{HasStore, IndexedStore};
use mcm_tracker::References;
use mcm_types::{ModelObject, ModelParameter, ObjectHeader, ObjectRef};

use crate::data::{HasParameter, ManagerPriority, ModelData};
use crate::manager::ModelManager;
use crate::services::ProjectServices;
use crate::settings::ProjectSettings;

// ---------------------------------------------------------------------------
// Particles
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub header: ObjectHeader,
    pub symbol: String,
    pub charge: i8,
}

impl Particle {
    pub fn new(symbol: &str, charge: i8) -> Self {
        Self {
            header: ObjectHeader::with_key(symbol),
            symbol: symbol.to_owned(),
            charge,
        }
    }
}

impl ModelObject for Particle {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }

    fn populate_from(&mut self, other: &Self) {
        self.symbol = other.symbol.clone();
        self.charge = other.charge;
    }

    fn is_equivalent(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Temperature(pub f64);

impl ModelParameter for Temperature {}

/// Particle store with a protected void particle at index 0.
#[derive(Debug)]
pub struct ParticleData {
    pub particles: IndexedStore<Particle>,
    pub temperature: Temperature,
}

impl Default for ParticleData {
    fn default() -> Self {
        Self {
            particles: [Particle::new("Void", 0)].into_iter().collect(),
            temperature: Temperature(300.0),
        }
    }
}

impl ModelData for ParticleData {
    fn reset_to_default(&mut self) {
        *self = Self::default();
    }
}

impl HasStore<Particle> for ParticleData {
    fn store(&self) -> &IndexedStore<Particle> {
        &self.particles
    }

    fn store_mut(&mut self) -> &mut IndexedStore<Particle> {
        &mut self.particles
    }
}

impl HasParameter<Temperature> for ParticleData {
    fn parameter(&self) -> &Temperature {
        &self.temperature
    }

    fn parameter_mut(&mut self) -> &mut Temperature {
        &mut self.temperature
    }
}

// ---------------------------------------------------------------------------
// Pair interactions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct PairInteraction {
    pub header: ObjectHeader,
    pub first: ObjectRef<Particle>,
    pub second: ObjectRef<Particle>,
}

impl PairInteraction {
    pub fn new(first: i32, second: i32) -> Self {
        Self {
            header: ObjectHeader::new(),
            first: ObjectRef::new(first),
            second: ObjectRef::new(second),
        }
    }

    pub fn involves(&self, particle: i32) -> bool {
        self.first.index() == particle || self.second.index() == particle
    }
}

impl ModelObject for PairInteraction {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }

    fn populate_from(&mut self, other: &Self) {
        self.first = other.first;
        self.second = other.second;
    }

    fn is_equivalent(&self, other: &Self) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }
}

impl References<Particle> for PairInteraction {
    fn references_mut(&mut self) -> Vec<&mut ObjectRef<Particle>> {
        vec![&mut self.first, &mut self.second]
    }
}

#[derive(Debug, Default)]
pub struct PairData {
    pub pairs: IndexedStore<PairInteraction>,
}

impl ModelData for PairData {
    fn reset_to_default(&mut self) {
        self.pairs.clear();
    }
}

impl HasStore<PairInteraction> for PairData {
    fn store(&self) -> &IndexedStore<PairInteraction> {
        &self.pairs
    }

    fn store_mut(&mut self) -> &mut IndexedStore<PairInteraction> {
        &mut self.pairs
    }
}

// ---------------------------------------------------------------------------
// Couplings between pair interactions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Coupling {
    pub header: ObjectHeader,
    pub pair: ObjectRef<PairInteraction>,
}

impl Coupling {
    pub fn new(pair: i32) -> Self {
        Self {
            header: ObjectHeader::new(),
            pair: ObjectRef::new(pair),
        }
    }
}

impl ModelObject for Coupling {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }

    fn populate_from(&mut self, other: &Self) {
        self.pair = other.pair;
    }

    fn is_equivalent(&self, other: &Self) -> bool {
        self.pair == other.pair
    }
}

impl References<PairInteraction> for Coupling {
    fn references_mut(&mut self) -> Vec<&mut ObjectRef<PairInteraction>> {
        vec![&mut self.pair]
    }
}

#[derive(Debug, Default)]
pub struct CouplingData {
    pub couplings: IndexedStore<Coupling>,
}

impl ModelData for CouplingData {
    fn reset_to_default(&mut self) {
        self.couplings.clear();
    }
}

impl HasStore<Coupling> for CouplingData {
    fn store(&self) -> &IndexedStore<Coupling> {
        &self.couplings
    }

    fn store_mut(&mut self) -> &mut IndexedStore<Coupling> {
        &mut self.couplings
    }
}

// ---------------------------------------------------------------------------
// Managers
// ---------------------------------------------------------------------------

pub fn services() -> Arc<ProjectServices> {
    ProjectServices::new(ProjectSettings::fast()).unwrap()
}

pub fn particle_validation() -> ValidationPipeline<ParticleData> {
    ValidationPipeline::<ParticleData>::strict()
        .register::<Particle, _>("particle uniqueness", |particle, data: &ParticleData| {
            let mut report = ValidationReport::new();
            validate_uniqueness(particle, data.particles.iter(), &mut report);
            Ok(report)
        })
        .register::<Temperature, _>("temperature range", |temperature, _| {
            if temperature.0 <= 0.0 {
                return Ok(ValidationReport::rejected("temperature must be positive"));
            }
            Ok(ValidationReport::new())
        })
}

pub fn particle_manager(services: &Arc<ProjectServices>) -> Arc<ModelManager<ParticleData>> {
    ModelManager::builder(
        "particles",
        ManagerPriority::Particles,
        ParticleData::default(),
        services,
    )
    .with_kind::<Particle>()
    .with_protected::<Particle>([0])
    .with_parameter::<Temperature>()
    .with_validation(particle_validation())
    .build()
    .unwrap()
}

/// Deprecate every live pair that involves the removed particle.
pub fn pair_dependencies() -> ConflictResolver<PairData> {
    ConflictResolver::new().on(
        DataOperation::ObjectRemoval,
        ConflictPipeline::<PairData>::new().register::<Particle, _>(
            "pairs of removed particle",
            |particle, data: &mut PairData| {
                let mut report = ConflictReport::new();
                for pair in data.pairs.iter_mut() {
                    if !pair.is_deprecated() && pair.involves(particle.index()) {
                        pair.deprecate();
                        report.record_deprecation(&*pair);
                    }
                }
                Ok(report)
            },
        ),
    )
}

pub fn pair_manager(services: &Arc<ProjectServices>) -> Arc<ModelManager<PairData>> {
    let manager = ModelManager::builder(
        "pairs",
        ManagerPriority::Energies,
        PairData::default(),
        services,
    )
    .with_kind::<PairInteraction>()
    .with_validation(ValidationPipeline::<PairData>::strict().register::<PairInteraction, _>(
        "pair uniqueness",
        |pair, data: &PairData| {
            let mut report = ValidationReport::new();
            validate_uniqueness(pair, data.pairs.iter(), &mut report);
            Ok(report)
        },
    ))
    .with_dependency_handlers(pair_dependencies())
    .build()
    .unwrap();
    manager
        .track_references::<PairInteraction, Particle>()
        .unwrap();
    manager
}

/// Deprecate every live coupling of the removed pair.
pub fn coupling_dependencies() -> ConflictResolver<CouplingData> {
    ConflictResolver::new().on(
        DataOperation::ObjectRemoval,
        ConflictPipeline::<CouplingData>::new().register::<PairInteraction, _>(
            "couplings of removed pair",
            |pair, data: &mut CouplingData| {
                let mut report = ConflictReport::new();
                for coupling in data.couplings.iter_mut() {
                    if !coupling.is_deprecated() && coupling.pair.index() == pair.index() {
                        coupling.deprecate();
                        report.record_deprecation(&*coupling);
                    }
                }
                Ok(report)
            },
        ),
    )
}

pub fn coupling_manager(services: &Arc<ProjectServices>) -> Arc<ModelManager<CouplingData>> {
    let manager = ModelManager::builder(
        "couplings",
        ManagerPriority::Simulations,
        CouplingData::default(),
        services,
    )
    .with_kind::<Coupling>()
    .with_dependency_handlers(coupling_dependencies())
    .build()
    .unwrap();
    manager
        .track_references::<Coupling, PairInteraction>()
        .unwrap();
    manager
}
