//! The model manager: the only way to change one domain's data.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use mcm_access::{DataAccessorSource, WriteLock};
use mcm_events::{ChangeKind, ChangeTag, EventChannel, EventFilter, EventStream, ModelEvent};
use mcm_pipeline::{
    validate_parameter_change, ConflictReport, ConflictResolver, DataOperation,
    ValidationPipeline, ValidationReport,
};
use mcm_store::{HasStore, StoreError};
use mcm_tracker::{ObjectTracker, PropagationReport, References, StoreId, TrackerResult};
use mcm_types::{ModelObject, ModelParameter, ObjectKind, ReindexingLedger, UNASSIGNED};

use crate::cascade::AnnouncingSite;
use crate::data::{HasParameter, InsertMode, ManagerPriority, ModelData};
use crate::error::{ManagerError, ManagerResult};
use crate::report::OperationReport;
use crate::services::ProjectServices;

/// Type-erased store operations of one object kind.
struct StoreHooks<D> {
    /// Registers every stored object with the tracker.
    retrack: fn(&D, &ObjectTracker, StoreId) -> TrackerResult<usize>,
    /// A ledger removing every current slot.
    clearing: fn(&D) -> ReindexingLedger,
    propagate: fn(&ObjectTracker, &ReindexingLedger) -> TrackerResult<Vec<PropagationReport>>,
}

/// A kind of object or parameter the manager accepts.
struct KindBinding<D> {
    kind: ObjectKind,
    /// `None` for parameters.
    store: Option<StoreHooks<D>>,
    /// Indices that may never be deprecated.
    protected: Vec<i32>,
}

fn retrack<D, T>(data: &D, tracker: &ObjectTracker, store: StoreId) -> TrackerResult<usize>
where
    D: HasStore<T>,
    T: ModelObject,
{
    let objects = <D as HasStore<T>>::store(data);
    for object in objects.iter() {
        tracker.track(store, object)?;
    }
    Ok(objects.len())
}

fn clearing<D, T>(data: &D) -> ReindexingLedger
where
    D: HasStore<T>,
    T: ModelObject,
{
    <D as HasStore<T>>::store(data)
        .iter()
        .map(|object| (object.index(), UNASSIGNED))
        .collect()
}

fn propagate<T: ModelObject>(
    tracker: &ObjectTracker,
    ledger: &ReindexingLedger,
) -> TrackerResult<Vec<PropagationReport>> {
    tracker.propagate::<T>(ledger)
}

/// Removal announcements for objects a conflict handler deprecated.
fn removal_events(conflict: &ConflictReport) -> Vec<(ObjectKind, ChangeKind)> {
    conflict
        .deprecated()
        .iter()
        .filter_map(|deprecated| {
            let object = deprecated.snapshot.clone()?;
            Some((
                deprecated.kind,
                ChangeKind::ObjectRemoved {
                    index: deprecated.index,
                    object,
                },
            ))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`ModelManager`]. Handler tables are fixed once built.
pub struct ManagerBuilder<D: ModelData> {
    name: String,
    priority: ManagerPriority,
    data: D,
    services: Arc<ProjectServices>,
    validation: ValidationPipeline<D>,
    conflicts: ConflictResolver<D>,
    dependencies: ConflictResolver<D>,
    insert_mode: InsertMode,
    kinds: Vec<KindBinding<D>>,
}

impl<D: ModelData> ManagerBuilder<D> {
    /// Accept objects of type `T`, stored in `D`'s `T` store.
    pub fn with_kind<T>(mut self) -> Self
    where
        D: HasStore<T>,
        T: ModelObject,
    {
        self.binding_mut(T::kind()).store = Some(StoreHooks {
            retrack: retrack::<D, T>,
            clearing: clearing::<D, T>,
            propagate: propagate::<T>,
        });
        self
    }

    /// Protect `indices` of `T` from deprecation.
    pub fn with_protected<T: ModelObject>(mut self, indices: impl IntoIterator<Item = i32>) -> Self {
        self.binding_mut(T::kind()).protected.extend(indices);
        self
    }

    /// Accept values of parameter `P`.
    pub fn with_parameter<P>(mut self) -> Self
    where
        D: HasParameter<P>,
        P: ModelParameter,
    {
        self.binding_mut(ObjectKind::of::<P>());
        self
    }

    pub fn with_validation(mut self, validation: ValidationPipeline<D>) -> Self {
        self.validation = validation;
        self
    }

    /// Conflict handlers for changes made through this manager.
    pub fn with_conflicts(mut self, conflicts: ConflictResolver<D>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Conflict handlers for changes announced by managers this one
    /// depends on.
    pub fn with_dependency_handlers(mut self, dependencies: ConflictResolver<D>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_insert_mode(mut self, insert_mode: InsertMode) -> Self {
        self.insert_mode = insert_mode;
        self
    }

    /// Register the store with the project tracker, track the initial
    /// objects, and put the data behind its lock.
    pub fn build(self) -> ManagerResult<Arc<ModelManager<D>>> {
        let Self {
            name,
            priority,
            data,
            services,
            validation,
            conflicts,
            dependencies,
            insert_mode,
            kinds,
        } = self;

        let tracker = services.tracker();
        let store_id = tracker.register_store(name.clone())?;
        let mut tracked = 0;
        for hooks in kinds.iter().filter_map(|b| b.store.as_ref()) {
            tracked += (hooks.retrack)(&data, tracker, store_id)?;
        }
        let source = DataAccessorSource::new(
            name.clone(),
            data,
            services.settings().concurrency.clone(),
        )?;

        info!(
            manager = %name,
            %priority,
            store = %store_id,
            kinds = kinds.len(),
            tracked,
            "manager started"
        );
        Ok(Arc::new(ModelManager {
            events: Arc::new(EventChannel::new(name.clone())),
            name,
            priority,
            store_id,
            source,
            services,
            validation,
            conflicts,
            dependencies,
            insert_mode,
            kinds,
        }))
    }

    fn binding_mut(&mut self, kind: ObjectKind) -> &mut KindBinding<D> {
        let position = match self.kinds.iter().position(|b| b.kind == kind) {
            Some(position) => position,
            None => {
                self.kinds.push(KindBinding {
                    kind,
                    store: None,
                    protected: Vec::new(),
                });
                self.kinds.len() - 1
            }
        };
        &mut self.kinds[position]
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of one domain's data object.
///
/// Input operations (`input_object`, `remove_object`, `replace_object`,
/// `set_parameter`, `clean_deprecated`, `reset`) run under the project input
/// lock. When that lock stays busy past its retry budget the operation is
/// not attempted and returns a busy [`OperationReport`]; a data lock that
/// stays busy is an [`AccessError`](mcm_access::AccessError) instead.
///
/// Events are published after the data lock is released and only for good
/// reports.
pub struct ModelManager<D: ModelData> {
    name: String,
    priority: ManagerPriority,
    store_id: StoreId,
    source: DataAccessorSource<D>,
    services: Arc<ProjectServices>,
    validation: ValidationPipeline<D>,
    conflicts: ConflictResolver<D>,
    dependencies: ConflictResolver<D>,
    events: Arc<EventChannel>,
    insert_mode: InsertMode,
    kinds: Vec<KindBinding<D>>,
}

impl<D: ModelData> ModelManager<D> {
    pub fn builder(
        name: impl Into<String>,
        priority: ManagerPriority,
        data: D,
        services: &Arc<ProjectServices>,
    ) -> ManagerBuilder<D> {
        ManagerBuilder {
            name: name.into(),
            priority,
            data,
            services: Arc::clone(services),
            validation: ValidationPipeline::new(),
            conflicts: ConflictResolver::new(),
            dependencies: ConflictResolver::new(),
            insert_mode: InsertMode::default(),
            kinds: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> ManagerPriority {
        self.priority
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    /// The channel this manager publishes its changes on.
    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn subscribe_stream(&self, filter: EventFilter) -> ManagerResult<EventStream> {
        Ok(self.events.stream(filter)?)
    }

    /// Register the references `H` objects hold to `Target` objects, so
    /// compacting the `Target` store rewrites them.
    ///
    /// Holders deprecated because their target was removed are announced
    /// on this manager's channel as `ObjectRemoved`.
    pub fn track_references<H, Target>(&self) -> ManagerResult<()>
    where
        D: HasStore<H>,
        H: ModelObject + References<Target> + Clone,
        Target: ModelObject,
    {
        let site = AnnouncingSite::<D, H, Target>::new(
            format!("{}.{}", self.name, H::kind()),
            self.source.clone(),
            Arc::clone(&self.events),
        );
        self.tracker().register_reference_site(Arc::new(site))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Input operations
    // -----------------------------------------------------------------------

    /// Validate `object` and store it, reusing a deprecated slot or
    /// appending depending on the insert mode.
    pub fn input_object<T>(&self, object: T) -> ManagerResult<OperationReport>
    where
        D: HasStore<T>,
        T: ModelObject + Clone,
    {
        let kind = T::kind();
        self.binding(kind)?;
        let mut report = OperationReport::new(format!("input {kind}"));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };
        if object.is_deprecated() {
            report.set_validation(ValidationReport::rejected(format!(
                "the provided {kind} is deprecated"
            )));
            return Ok(report.finish());
        }

        let mut accessor = self.source.create()?;
        let validation = self.validation.validate(&object, accessor.data())?;
        let accepted = validation.is_good();
        report.set_validation(validation);
        if !accepted {
            debug!(manager = %self.name, %kind, "input rejected");
            return Ok(report.finish());
        }

        let insert_mode = self.insert_mode;
        let (stored, overwritten) = accessor.query_mut(|data| {
            let store = <D as HasStore<T>>::store_mut(data);
            match insert_mode {
                InsertMode::ReuseDeprecated => {
                    let overwritten = store.iter().find(|o| o.is_deprecated()).cloned();
                    (store.insert_reusing_deprecated(object).clone(), overwritten)
                }
                InsertMode::Append => (store.append(object).clone(), None),
            }
        });
        let index = stored.index();
        let conflict = match self.conflicts.resolve(
            DataOperation::NewObject,
            &stored,
            accessor.data_mut(),
        ) {
            Ok(conflict) => conflict,
            Err(fault) => {
                let reverted = accessor.query_mut(|data| {
                    <D as HasStore<T>>::store_mut(data).revert_insert(index, overwritten)
                });
                drop(accessor);
                match reverted {
                    Ok(_) => warn!(manager = %self.name, %kind, index, "input reverted after handler fault"),
                    Err(e) => {
                        // The object stays; it must remain reachable.
                        warn!(manager = %self.name, %kind, index, error = %e, "input could not be reverted");
                        self.tracker().track(self.store_id, &stored)?;
                    }
                }
                return Err(fault.into());
            }
        };
        let follow_ups = removal_events(&conflict);
        report.set_conflict(conflict);
        drop(accessor);

        self.tracker().track(self.store_id, &stored)?;
        info!(manager = %self.name, %kind, index, "object added");

        if report.is_good() {
            self.publish(kind, ChangeKind::added(&stored), &mut report)?;
            self.publish_all(follow_ups, &mut report)?;
        }
        Ok(report.finish())
    }

    /// Deprecate the `T` at `index`. Removing an already deprecated object
    /// succeeds without announcing anything.
    pub fn remove_object<T>(&self, index: i32) -> ManagerResult<OperationReport>
    where
        D: HasStore<T>,
        T: ModelObject + Clone,
    {
        let kind = T::kind();
        let binding = self.binding(kind)?;
        let mut report = OperationReport::new(format!("remove {kind} {index}"));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };
        self.resolve_owned::<T>(index)?;

        let mut accessor = self.source.create()?;
        let removed = accessor.query_mut(|data| {
            let store = <D as HasStore<T>>::store_mut(data);
            if !store.deprecate(index, &binding.protected)? {
                return Ok::<_, StoreError>(None);
            }
            Ok(store.get(index).cloned())
        })?;
        let Some(removed) = removed else {
            debug!(manager = %self.name, %kind, index, "object already deprecated");
            return Ok(report.finish());
        };

        let conflict =
            self.conflicts
                .resolve(DataOperation::ObjectRemoval, &removed, accessor.data_mut())?;
        let follow_ups = removal_events(&conflict);
        report.set_conflict(conflict);
        drop(accessor);

        info!(manager = %self.name, %kind, index, "object removed");
        if report.is_good() {
            self.publish(kind, ChangeKind::removed(&removed), &mut report)?;
            self.publish_all(follow_ups, &mut report)?;
        }
        Ok(report.finish())
    }

    /// Replace the content of the `T` at `index`, keeping its index and key.
    ///
    /// The original is deprecated while the replacement is validated, so it
    /// does not count as a duplicate of it. A rejected replacement leaves the
    /// original restored and unchanged.
    pub fn replace_object<T>(&self, index: i32, replacement: T) -> ManagerResult<OperationReport>
    where
        D: HasStore<T>,
        T: ModelObject + Clone,
    {
        let kind = T::kind();
        self.binding(kind)?;
        let mut report = OperationReport::new(format!("replace {kind} {index}"));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };
        self.resolve_owned::<T>(index)?;

        let mut accessor = self.source.create()?;
        let original = accessor.query_mut(|data| {
            let store = <D as HasStore<T>>::store_mut(data);
            let original = store.get(index).cloned();
            store
                .deprecate(index, &[])
                .map(|was_live| original.filter(|_| was_live))
        })?;
        let Some(original) = original else {
            report.set_validation(ValidationReport::rejected(format!(
                "the {kind} at index ({index}) is deprecated and cannot be replaced"
            )));
            return Ok(report.finish());
        };

        let mut candidate = replacement;
        candidate.set_index(index);
        candidate.restore();
        let validation = self.validation.validate(&candidate, accessor.data());
        let accepted = validation.as_ref().is_ok_and(|v| v.is_good());
        let stored = accessor.query_mut(|data| {
            let store = <D as HasStore<T>>::store_mut(data);
            if accepted {
                store.replace(index, &candidate)?;
            } else {
                store.restore(index)?;
            }
            Ok::<_, StoreError>(store.get(index).cloned())
        })?;
        report.set_validation(validation?);
        let Some(stored) = stored.filter(|_| accepted) else {
            debug!(manager = %self.name, %kind, index, "replacement rejected");
            return Ok(report.finish());
        };

        let conflict = match self.conflicts.resolve(
            DataOperation::ObjectChange,
            &stored,
            accessor.data_mut(),
        ) {
            Ok(conflict) => conflict,
            Err(fault) => {
                accessor.query_mut(|data| {
                    if let Some(slot) = <D as HasStore<T>>::store_mut(data).get_mut(index) {
                        *slot = original;
                    }
                });
                warn!(manager = %self.name, %kind, index, "replacement reverted after handler fault");
                return Err(fault.into());
            }
        };
        let follow_ups = removal_events(&conflict);
        report.set_conflict(conflict);
        drop(accessor);

        self.tracker().track(self.store_id, &stored)?;
        info!(manager = %self.name, %kind, index, "object replaced");
        if report.is_good() {
            self.publish(kind, ChangeKind::changed(&stored), &mut report)?;
            self.publish_all(follow_ups, &mut report)?;
        }
        Ok(report.finish())
    }

    /// Replace the value of parameter `P`. Setting the current value again
    /// is accepted with a notice.
    pub fn set_parameter<P>(&self, value: P) -> ManagerResult<OperationReport>
    where
        D: HasParameter<P>,
        P: ModelParameter,
    {
        let kind = ObjectKind::of::<P>();
        self.binding(kind)?;
        let mut report = OperationReport::new(format!("set {kind}"));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };

        let mut accessor = self.source.create()?;
        let mut validation = self.validation.validate(&value, accessor.data())?;
        validate_parameter_change(
            <D as HasParameter<P>>::parameter(accessor.data()),
            &value,
            &mut validation,
        );
        let accepted = validation.is_good();
        report.set_validation(validation);
        if !accepted {
            debug!(manager = %self.name, %kind, "parameter rejected");
            return Ok(report.finish());
        }

        let previous = std::mem::replace(
            <D as HasParameter<P>>::parameter_mut(accessor.data_mut()),
            value.clone(),
        );
        let conflict = match self.conflicts.resolve(
            DataOperation::ParameterChange,
            &value,
            accessor.data_mut(),
        ) {
            Ok(conflict) => conflict,
            Err(fault) => {
                *<D as HasParameter<P>>::parameter_mut(accessor.data_mut()) = previous;
                warn!(manager = %self.name, %kind, "parameter reverted after handler fault");
                return Err(fault.into());
            }
        };
        let follow_ups = removal_events(&conflict);
        report.set_conflict(conflict);
        drop(accessor);

        info!(manager = %self.name, %kind, "parameter changed");
        if report.is_good() {
            self.publish(kind, ChangeKind::parameter(&value), &mut report)?;
            self.publish_all(follow_ups, &mut report)?;
        }
        Ok(report.finish())
    }

    /// Compact the `T` store, then remap the tracker and every reference
    /// site pointing at `T`.
    ///
    /// Nothing is published when no object was deprecated.
    pub fn clean_deprecated<T>(&self) -> ManagerResult<OperationReport>
    where
        D: HasStore<T>,
        T: ModelObject,
    {
        let kind = T::kind();
        self.binding(kind)?;
        let mut report = OperationReport::new(format!("clean {kind}"));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };

        let ledger = {
            let mut accessor = self.source.create()?;
            accessor.query_mut(|data| <D as HasStore<T>>::store_mut(data).compact_deprecated())
        };
        if ledger.is_identity() {
            debug!(manager = %self.name, %kind, "nothing to clean");
            return Ok(report.finish());
        }

        let tracker = self.tracker();
        let summary = tracker.apply_reindexing::<T>(&ledger)?;
        report.add_propagation(tracker.propagate::<T>(&ledger)?);
        info!(
            manager = %self.name,
            %kind,
            removed = summary.removed,
            moved = summary.moved,
            sites = report.propagation().len(),
            "deprecated objects cleaned"
        );

        self.publish(kind, ChangeKind::reindexed(ledger), &mut report)?;
        Ok(report.finish())
    }

    /// Put the data back to its defaults and track them afresh.
    ///
    /// Every reference into this manager's stores is invalidated, the
    /// defaults included: they are new objects. Holders of such references
    /// are deprecated like after a compaction that removed every slot.
    pub fn reset(&self) -> ManagerResult<OperationReport> {
        let mut report = OperationReport::new(format!("reset {}", self.name));
        let Some(_input) = self.enter_input(&mut report)? else {
            return Ok(report.finish());
        };

        let tracker = self.tracker();
        let mut accessor = self.source.create()?;
        let ledgers: Vec<(&StoreHooks<D>, ReindexingLedger)> = self
            .kinds
            .iter()
            .filter_map(|b| b.store.as_ref())
            .map(|hooks| (hooks, (hooks.clearing)(accessor.data())))
            .collect();
        accessor.data_mut().reset_to_default();
        let cleared = tracker.clear_store(self.store_id)?;
        let mut tracked = 0;
        for (hooks, _) in &ledgers {
            tracked += (hooks.retrack)(accessor.data(), tracker, self.store_id)?;
        }
        drop(accessor);

        for (hooks, ledger) in &ledgers {
            report.add_propagation((hooks.propagate)(tracker, ledger)?);
        }
        info!(
            manager = %self.name,
            cleared,
            tracked,
            sites = report.propagation().len(),
            "manager reset"
        );
        self.publish(ObjectKind::of::<D>(), ChangeKind::ManagerReset, &mut report)?;
        Ok(report.finish())
    }

    /// Repair this manager's data after a change published by a manager it
    /// depends on.
    ///
    /// Runs under the data lock only; the upstream operation already holds
    /// the project input lock.
    pub fn handle_dependency_event(&self, event: &ModelEvent) -> ManagerResult<OperationReport> {
        let mut report = OperationReport::new(format!(
            "{} {} from '{}'",
            event.tag(),
            event.kind,
            event.source
        ));
        let operation = match event.tag() {
            ChangeTag::ObjectAdded => DataOperation::NewObject,
            ChangeTag::ObjectChanged => DataOperation::ObjectChange,
            ChangeTag::ObjectRemoved => DataOperation::ObjectRemoval,
            ChangeTag::ParameterChanged => DataOperation::ParameterChange,
            // References were already rewritten through the tracker's
            // reference sites before these were published.
            ChangeTag::Reindexed | ChangeTag::ManagerReset => return Ok(report.finish()),
        };
        let Some(candidate) = event.snapshot() else {
            return Ok(report.finish());
        };

        let mut accessor = self.source.create()?;
        let conflict = self
            .dependencies
            .resolve(operation, candidate, accessor.data_mut())?;
        let follow_ups = removal_events(&conflict);
        report.set_conflict(conflict);
        drop(accessor);

        if !follow_ups.is_empty() {
            info!(
                manager = %self.name,
                upstream = %event.source,
                deprecated = follow_ups.len(),
                "dependents deprecated"
            );
        }
        if report.is_good() {
            self.publish_all(follow_ups, &mut report)?;
        }
        Ok(report.finish())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Advisory lookup of a live `T` by key. Returns `None` rather than
    /// waiting when the data is being written.
    pub fn find_by_key<T>(&self, key: &str) -> ManagerResult<Option<T>>
    where
        D: HasStore<T>,
        T: ModelObject + Clone,
    {
        match self.source.create_reader_unsafe() {
            Ok(reader) => Ok(reader.query(|data| {
                <D as HasStore<T>>::store(data).find_by_key(key).cloned()
            })),
            Err(e) if e.is_busy() => {
                debug!(manager = %self.name, key, "lookup skipped, data busy");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The `T` at `index`, deprecated or not.
    pub fn get<T>(&self, index: i32) -> ManagerResult<Option<T>>
    where
        D: HasStore<T>,
        T: ModelObject + Clone,
    {
        let reader = self.source.create_reader()?;
        Ok(reader.query(|data| <D as HasStore<T>>::store(data).get(index).cloned()))
    }

    /// Read-only projection of the data under the shared lock.
    pub fn query<R>(&self, function: impl FnOnce(&D) -> R) -> ManagerResult<R> {
        let reader = self.source.create_reader()?;
        Ok(reader.query(function))
    }

    /// [`query`](Self::query) on a blocking worker thread.
    pub async fn query_async<R, F>(&self, function: F) -> ManagerResult<R>
    where
        F: FnOnce(&D) -> R + Send + 'static,
        R: Send + 'static,
    {
        Ok(self.source.query_async(function).await?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn tracker(&self) -> &ObjectTracker {
        self.services.tracker()
    }

    fn binding(&self, kind: ObjectKind) -> ManagerResult<&KindBinding<D>> {
        self.kinds
            .iter()
            .find(|binding| binding.kind == kind)
            .ok_or_else(|| ManagerError::UnsupportedType {
                manager: self.name.clone(),
                kind,
            })
    }

    /// `None` means the project is busy; `report` is marked accordingly.
    fn enter_input(&self, report: &mut OperationReport) -> ManagerResult<Option<WriteLock<'_, ()>>> {
        match self.services.acquire_input() {
            Ok(guard) => Ok(Some(guard)),
            Err(e) if e.is_busy() => {
                warn!(manager = %self.name, operation = report.description(), "project busy");
                report.mark_busy();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_owned<T: ModelObject>(&self, index: i32) -> ManagerResult<()> {
        let resolved = self.tracker().resolve_by_index::<T>(index)?;
        if resolved.entry.store != self.store_id {
            return Err(ManagerError::NotOwned {
                manager: self.name.clone(),
                kind: T::kind(),
                index,
            });
        }
        Ok(())
    }

    fn publish(
        &self,
        kind: ObjectKind,
        change: ChangeKind,
        report: &mut OperationReport,
    ) -> ManagerResult<()> {
        let outcome = self.events.publish(kind, change)?;
        for failure in outcome.failures {
            report.add_dependency_failure(format!("{}: {:#}", failure.subscriber, failure.error));
        }
        Ok(())
    }

    fn publish_all(
        &self,
        changes: Vec<(ObjectKind, ChangeKind)>,
        report: &mut OperationReport,
    ) -> ManagerResult<()> {
        for (kind, change) in changes {
            self.publish(kind, change, report)?;
        }
        Ok(())
    }
}

impl<D: ModelData> fmt::Debug for ModelManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.kinds.iter().map(|b| b.kind.name()).collect();
        f.debug_struct("ModelManager")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("store", &self.store_id)
            .field("kinds", &kinds)
            .field("insert_mode", &self.insert_mode)
            .finish_non_exhaustive()
    }
}
