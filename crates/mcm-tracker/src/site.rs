//! Reference sites: stores whose objects hold [`ObjectRef`]s to another kind.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mcm_access::DataAccessorSource;
use mcm_store::HasStore;
use mcm_types::{ModelObject, ObjectKind, ObjectRef, RefUpdate, ReindexingLedger};

use crate::error::TrackerResult;

/// Implemented by model objects that embed references to `Target`.
pub trait References<Target> {
    /// Every reference to `Target` held by this object.
    fn references_mut(&mut self) -> Vec<&mut ObjectRef<Target>>;
}

/// A place that must be rewritten when the target store is compacted.
pub trait ReferenceSite: Send + Sync {
    fn name(&self) -> &str;

    /// The kind the references point at.
    fn target(&self) -> ObjectKind;

    /// The kind of the objects holding the references.
    fn holder(&self) -> ObjectKind;

    /// Apply `ledger` to every reference in the site and deprecate holders
    /// that lost a target.
    fn rewrite(&self, ledger: &ReindexingLedger) -> TrackerResult<PropagationReport>;
}

/// Outcome of rewriting one reference site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    pub site: String,
    pub holder: String,
    pub target: String,
    /// References moved to a new index.
    pub rewritten: usize,
    /// References whose target was removed.
    pub invalidated: usize,
    /// Indices of holders deprecated because a reference was invalidated.
    pub deprecated: Vec<i32>,
    /// Listeners of the holder's owner that failed to handle the
    /// deprecations.
    #[serde(default)]
    pub failures: Vec<String>,
}

impl PropagationReport {
    fn new(site: &str, holder: ObjectKind, target: ObjectKind) -> Self {
        Self {
            site: site.to_owned(),
            holder: holder.name().to_owned(),
            target: target.name().to_owned(),
            ..Self::default()
        }
    }

    /// Returns `true` if no reference was invalidated.
    pub fn is_clean(&self) -> bool {
        self.invalidated == 0
    }
}

/// Reference site backed by the `H` store inside a manager's data object.
///
/// Holds a clone of the manager's accessor source and takes its write lock
/// for the duration of one rewrite.
pub struct StoreReferenceSite<D, H, Target> {
    name: String,
    source: DataAccessorSource<D>,
    _types: PhantomData<fn() -> (H, Target)>,
}

impl<D, H, Target> StoreReferenceSite<D, H, Target>
where
    D: HasStore<H> + Send + Sync + 'static,
    H: ModelObject + References<Target>,
    Target: ModelObject,
{
    pub fn new(name: impl Into<String>, source: DataAccessorSource<D>) -> Self {
        Self {
            name: name.into(),
            source,
            _types: PhantomData,
        }
    }
}

impl<D, H, Target> ReferenceSite for StoreReferenceSite<D, H, Target>
where
    D: HasStore<H> + Send + Sync + 'static,
    H: ModelObject + References<Target>,
    Target: ModelObject,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> ObjectKind {
        Target::kind()
    }

    fn holder(&self) -> ObjectKind {
        H::kind()
    }

    fn rewrite(&self, ledger: &ReindexingLedger) -> TrackerResult<PropagationReport> {
        let mut report = PropagationReport::new(&self.name, H::kind(), Target::kind());
        if ledger.is_identity() {
            return Ok(report);
        }

        let mut accessor = self.source.create()?;
        accessor.query_mut(|data| {
            for holder in <D as HasStore<H>>::store_mut(data).iter_mut() {
                let mut lost_target = false;
                for reference in holder.references_mut() {
                    match reference.apply(ledger) {
                        RefUpdate::Unchanged => {}
                        RefUpdate::Moved { .. } => report.rewritten += 1,
                        RefUpdate::Invalidated { from } => {
                            debug!(site = %self.name, target = %Target::kind(), from, "reference invalidated");
                            report.invalidated += 1;
                            lost_target = true;
                        }
                    }
                }
                if lost_target && !holder.is_deprecated() {
                    holder.deprecate();
                    report.deprecated.push(holder.index());
                }
            }
        });
        drop(accessor);

        if !report.deprecated.is_empty() {
            warn!(
                site = %self.name,
                holder = %H::kind(),
                count = report.deprecated.len(),
                "holders deprecated after target removal"
            );
        }
        Ok(report)
    }
}

impl<D, H, Target> fmt::Debug for StoreReferenceSite<D, H, Target> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreReferenceSite")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .finish()
    }
}
