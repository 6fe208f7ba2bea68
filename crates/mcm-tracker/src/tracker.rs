//! Project-wide index of model objects and their reference sites.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mcm_types::{ModelObject, ObjectKind, ObjectRef, ReindexingLedger};

use crate::error::{TrackerError, TrackerResult};
use crate::site::{PropagationReport, ReferenceSite};

/// Identity of a store registered with an [`ObjectTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(u32);

impl StoreId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Where a tracked object lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerEntry {
    pub kind: ObjectKind,
    pub store: StoreId,
    pub index: i32,
    pub key: Option<String>,
}

/// A successful lookup: the tracker entry plus a typed reference to it.
pub struct Resolved<T> {
    pub entry: TrackerEntry,
    pub reference: ObjectRef<T>,
}

impl<T> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("entry", &self.entry)
            .field("reference", &self.reference)
            .finish()
    }
}

/// Counts from remapping one kind's entries through a ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexSummary {
    pub moved: usize,
    pub removed: usize,
    pub unchanged: usize,
}

#[derive(Default)]
struct KindTable {
    by_index: HashMap<i32, TrackerEntry>,
    by_key: HashMap<String, i32>,
}

impl KindTable {
    fn insert(&mut self, entry: TrackerEntry) {
        self.remove(entry.index);
        if let Some(key) = &entry.key {
            if let Some(previous) = self.by_key.insert(key.clone(), entry.index) {
                // The key moved to a new slot; the old slot keeps its entry
                // but loses the key.
                if let Some(old) = self.by_index.get_mut(&previous) {
                    old.key = None;
                }
            }
        }
        self.by_index.insert(entry.index, entry);
    }

    fn remove(&mut self, index: i32) -> Option<TrackerEntry> {
        let entry = self.by_index.remove(&index)?;
        if let Some(key) = &entry.key {
            if self.by_key.get(key) == Some(&index) {
                self.by_key.remove(key);
            }
        }
        Some(entry)
    }

    fn reindex(&mut self, ledger: &ReindexingLedger) -> ReindexSummary {
        let mut summary = ReindexSummary::default();
        let mut rebuilt = KindTable::default();
        for (_, mut entry) in self.by_index.drain() {
            match ledger.lookup(entry.index) {
                Some(new) if new < 0 => summary.removed += 1,
                Some(new) if new != entry.index => {
                    entry.index = new;
                    summary.moved += 1;
                    rebuilt.insert(entry);
                }
                _ => {
                    summary.unchanged += 1;
                    rebuilt.insert(entry);
                }
            }
        }
        *self = rebuilt;
        summary
    }
}

/// Registry mapping `(kind, index)` and `(kind, key)` to the owning store.
///
/// Shared between managers as `Arc<ObjectTracker>`. All maps sit behind
/// their own `RwLock`; lookups take the read side only.
pub struct ObjectTracker {
    tables: RwLock<HashMap<ObjectKind, KindTable>>,
    stores: RwLock<Vec<String>>,
    sites: RwLock<HashMap<ObjectKind, Vec<Arc<dyn ReferenceSite>>>>,
}

impl ObjectTracker {
    /// Create a new empty tracker.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            stores: RwLock::new(Vec::new()),
            sites: RwLock::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Stores
    // -----------------------------------------------------------------------

    /// Hand out a new store id.
    pub fn register_store(&self, name: impl Into<String>) -> TrackerResult<StoreId> {
        let mut stores = self.stores.write().map_err(|_| TrackerError::Poisoned)?;
        let id = StoreId(stores.len() as u32);
        let name = name.into();
        debug!(store = %id, name = %name, "store registered");
        stores.push(name);
        Ok(id)
    }

    pub fn store_name(&self, store: StoreId) -> TrackerResult<String> {
        let stores = self.stores.read().map_err(|_| TrackerError::Poisoned)?;
        stores
            .get(store.0 as usize)
            .cloned()
            .ok_or(TrackerError::UnknownStore(store))
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// Insert or overwrite the entry of `T` at `index`.
    ///
    /// Unassigned indices are ignored.
    pub fn register<T: ModelObject>(
        &self,
        store: StoreId,
        index: i32,
        key: Option<&str>,
    ) -> TrackerResult<()> {
        self.store_name(store)?;
        if index < 0 {
            debug!(kind = %T::kind(), index, "unassigned object not tracked");
            return Ok(());
        }
        let entry = TrackerEntry {
            kind: T::kind(),
            store,
            index,
            key: key.map(str::to_owned),
        };
        self.write_tables()?
            .entry(entry.kind)
            .or_default()
            .insert(entry);
        Ok(())
    }

    /// Register `object` under its current index and key.
    pub fn track<T: ModelObject>(&self, store: StoreId, object: &T) -> TrackerResult<()> {
        self.register::<T>(store, object.index(), object.key())
    }

    pub fn resolve_by_index<T: ModelObject>(&self, index: i32) -> TrackerResult<Resolved<T>> {
        let kind = T::kind();
        let tables = self.read_tables()?;
        let entry = tables
            .get(&kind)
            .and_then(|table| table.by_index.get(&index))
            .cloned()
            .ok_or_else(|| TrackerError::missing_index(kind, index))?;
        Ok(Resolved {
            reference: ObjectRef::new(entry.index),
            entry,
        })
    }

    pub fn resolve_by_key<T: ModelObject>(&self, key: &str) -> TrackerResult<Resolved<T>> {
        let kind = T::kind();
        let tables = self.read_tables()?;
        let entry = tables
            .get(&kind)
            .and_then(|table| {
                let index = table.by_key.get(key)?;
                table.by_index.get(index)
            })
            .cloned()
            .ok_or_else(|| TrackerError::missing_key(kind, key))?;
        Ok(Resolved {
            reference: ObjectRef::new(entry.index),
            entry,
        })
    }

    pub fn contains<T: ModelObject>(&self, index: i32) -> TrackerResult<bool> {
        Ok(self
            .read_tables()?
            .get(&T::kind())
            .is_some_and(|table| table.by_index.contains_key(&index)))
    }

    /// Remap every entry of `T` through `ledger`. Entries mapped to `-1` are
    /// dropped together with their keys; entries the ledger does not cover
    /// are kept as they are.
    pub fn apply_reindexing<T: ModelObject>(
        &self,
        ledger: &ReindexingLedger,
    ) -> TrackerResult<ReindexSummary> {
        let kind = T::kind();
        let mut tables = self.write_tables()?;
        let summary = match tables.get_mut(&kind) {
            Some(table) => table.reindex(ledger),
            None => ReindexSummary::default(),
        };
        debug!(
            kind = %kind,
            moved = summary.moved,
            removed = summary.removed,
            "tracker entries reindexed"
        );
        Ok(summary)
    }

    /// Drop the entry of `T` at `index`.
    pub fn purge<T: ModelObject>(&self, index: i32) -> TrackerResult<Option<TrackerEntry>> {
        Ok(self
            .write_tables()?
            .get_mut(&T::kind())
            .and_then(|table| table.remove(index)))
    }

    /// Drop every entry of `T`. Returns how many were removed.
    pub fn clear_kind<T: ModelObject>(&self) -> TrackerResult<usize> {
        let removed = self
            .write_tables()?
            .remove(&T::kind())
            .map_or(0, |table| table.by_index.len());
        if removed > 0 {
            info!(kind = %T::kind(), removed, "tracker entries cleared");
        }
        Ok(removed)
    }

    /// Drop every entry owned by `store`, whatever its kind. Returns how
    /// many were removed.
    pub fn clear_store(&self, store: StoreId) -> TrackerResult<usize> {
        let mut tables = self.write_tables()?;
        let mut removed = 0;
        for table in tables.values_mut() {
            let doomed: Vec<i32> = table
                .by_index
                .values()
                .filter(|entry| entry.store == store)
                .map(|entry| entry.index)
                .collect();
            for index in doomed {
                table.remove(index);
                removed += 1;
            }
        }
        tables.retain(|_, table| !table.by_index.is_empty());
        if removed > 0 {
            info!(store = %store, removed, "tracker entries cleared");
        }
        Ok(removed)
    }

    /// Total number of entries across all kinds.
    pub fn len(&self) -> TrackerResult<usize> {
        Ok(self
            .read_tables()?
            .values()
            .map(|table| table.by_index.len())
            .sum())
    }

    pub fn is_empty(&self) -> TrackerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All entries of `T`, sorted by index.
    pub fn entries_of<T: ModelObject>(&self) -> TrackerResult<Vec<TrackerEntry>> {
        let mut entries: Vec<TrackerEntry> = self
            .read_tables()?
            .get(&T::kind())
            .map(|table| table.by_index.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by_key(|entry| entry.index);
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Reference sites
    // -----------------------------------------------------------------------

    /// Register a place holding references to `site.target()`.
    pub fn register_reference_site(&self, site: Arc<dyn ReferenceSite>) -> TrackerResult<()> {
        let mut sites = self.sites.write().map_err(|_| TrackerError::Poisoned)?;
        debug!(
            site = site.name(),
            holder = %site.holder(),
            target = %site.target(),
            "reference site registered"
        );
        sites.entry(site.target()).or_default().push(site);
        Ok(())
    }

    /// Number of reference sites pointing at `T`.
    pub fn site_count<T: ModelObject>(&self) -> TrackerResult<usize> {
        let sites = self.sites.read().map_err(|_| TrackerError::Poisoned)?;
        Ok(sites.get(&T::kind()).map_or(0, Vec::len))
    }

    /// Rewrite every reference to `T` according to `ledger`.
    ///
    /// Sites are visited in registration order, each under its own write
    /// lock. The caller must not hold a lock on any holder store. A site
    /// that fails does not stop the others; the first failure is returned
    /// once all sites were visited.
    pub fn propagate<T: ModelObject>(
        &self,
        ledger: &ReindexingLedger,
    ) -> TrackerResult<Vec<PropagationReport>> {
        if ledger.is_identity() {
            return Ok(Vec::new());
        }
        let sites: Vec<Arc<dyn ReferenceSite>> = {
            let sites = self.sites.read().map_err(|_| TrackerError::Poisoned)?;
            sites.get(&T::kind()).cloned().unwrap_or_default()
        };

        let mut reports = Vec::with_capacity(sites.len());
        let mut failure = None;
        for site in sites {
            match site.rewrite(ledger) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(site = site.name(), target = %T::kind(), error = %e, "reference propagation failed");
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    fn read_tables(&self) -> TrackerResult<RwLockReadGuard<'_, HashMap<ObjectKind, KindTable>>> {
        self.tables.read().map_err(|_| TrackerError::Poisoned)
    }

    fn write_tables(
        &self,
    ) -> TrackerResult<RwLockWriteGuard<'_, HashMap<ObjectKind, KindTable>>> {
        self.tables.write().map_err(|_| TrackerError::Poisoned)
    }
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.len().unwrap_or_default();
        f.debug_struct("ObjectTracker")
            .field("entries", &entries)
            .finish_non_exhaustive()
    }
}
