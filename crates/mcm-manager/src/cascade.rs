//! Reference sites owned by a manager.
//!
//! A [`StoreReferenceSite`] deprecates holders whose target was removed, but
//! only the manager owning the holders can tell its own dependents. The
//! [`AnnouncingSite`] wraps it and publishes an `ObjectRemoved` event on the
//! owner's channel for every holder the rewrite deprecated.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use mcm_access::DataAccessorSource;
use mcm_events::{ChangeKind, EventChannel};
use mcm_store::HasStore;
use mcm_tracker::{PropagationReport, ReferenceSite, References, StoreReferenceSite, TrackerResult};
use mcm_types::{ModelObject, ObjectKind, ReindexingLedger};

pub(crate) struct AnnouncingSite<D, H, Target> {
    site: StoreReferenceSite<D, H, Target>,
    source: DataAccessorSource<D>,
    events: Arc<EventChannel>,
}

impl<D, H, Target> AnnouncingSite<D, H, Target>
where
    D: HasStore<H> + Send + Sync + 'static,
    H: ModelObject + References<Target> + Clone,
    Target: ModelObject,
{
    pub(crate) fn new(
        name: String,
        source: DataAccessorSource<D>,
        events: Arc<EventChannel>,
    ) -> Self {
        Self {
            site: StoreReferenceSite::new(name, source.clone()),
            source,
            events,
        }
    }
}

impl<D, H, Target> ReferenceSite for AnnouncingSite<D, H, Target>
where
    D: HasStore<H> + Send + Sync + 'static,
    H: ModelObject + References<Target> + Clone,
    Target: ModelObject,
{
    fn name(&self) -> &str {
        self.site.name()
    }

    fn target(&self) -> ObjectKind {
        self.site.target()
    }

    fn holder(&self) -> ObjectKind {
        self.site.holder()
    }

    /// Rewrite under the holder's write lock, then announce the deprecated
    /// holders with no lock held.
    fn rewrite(&self, ledger: &ReindexingLedger) -> TrackerResult<PropagationReport> {
        let mut report = self.site.rewrite(ledger)?;
        if report.deprecated.is_empty() {
            return Ok(report);
        }

        let holders: Vec<H> = {
            let reader = self.source.create_reader()?;
            reader.query(|data| {
                let store = <D as HasStore<H>>::store(data);
                report
                    .deprecated
                    .iter()
                    .filter_map(|&index| store.get(index).cloned())
                    .collect()
            })
        };

        for holder in &holders {
            match self.events.publish(H::kind(), ChangeKind::removed(holder)) {
                Ok(outcome) => report.failures.extend(
                    outcome
                        .failures
                        .into_iter()
                        .map(|f| format!("{}: {:#}", f.subscriber, f.error)),
                ),
                Err(e) => {
                    warn!(site = %self.site.name(), index = holder.index(), error = %e, "cascade not announced");
                    report.failures.push(format!("{}: {e}", self.events.name()));
                }
            }
        }
        Ok(report)
    }
}

impl<D, H, Target> fmt::Debug for AnnouncingSite<D, H, Target> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnouncingSite")
            .field("site", &self.site)
            .field("channel", &self.events.name())
            .finish()
    }
}
