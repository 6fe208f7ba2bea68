use mcm_types::ModelObject;

use crate::store::IndexedStore;

/// A data object that owns an [`IndexedStore`] of `T`.
///
/// Manager data types implement this once per object type they hold, which
/// lets generic code (managers, reference sites) reach the right store
/// without naming fields.
///
/// ```
/// use mcm_store::{HasStore, IndexedStore};
/// # use mcm_types::{ModelObject, ObjectHeader};
/// # struct Particle { header: ObjectHeader }
/// # impl ModelObject for Particle {
/// #     fn header(&self) -> &ObjectHeader { &self.header }
/// #     fn header_mut(&mut self) -> &mut ObjectHeader { &mut self.header }
/// #     fn populate_from(&mut self, _other: &Self) {}
/// # }
/// #[derive(Default)]
/// struct ParticleData {
///     particles: IndexedStore<Particle>,
/// }
///
/// impl HasStore<Particle> for ParticleData {
///     fn store(&self) -> &IndexedStore<Particle> {
///         &self.particles
///     }
///
///     fn store_mut(&mut self) -> &mut IndexedStore<Particle> {
///         &mut self.particles
///     }
/// }
/// ```
pub trait HasStore<T: ModelObject> {
    fn store(&self) -> &IndexedStore<T>;

    fn store_mut(&mut self) -> &mut IndexedStore<T>;
}
